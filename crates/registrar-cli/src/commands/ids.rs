//! Identifier generation.

use registrar_auth::identifiers::{
    IdentifierGenerator, generate_employee_id, generate_student_id,
};

use super::Context;

/// Which identifier to generate.
pub enum IdKind {
    /// Student identifier.
    Student { year: i32, department: String },
    /// Employee identifier.
    Employee { department: String, role: String },
}

/// Arguments for the ids command.
pub struct IdsArgs {
    /// Identifier kind.
    pub kind: IdKind,
    /// Use the timestamp suffix instead of a store sequence.
    pub timestamp: bool,
}

/// Run the ids command.
///
/// # Errors
///
/// Returns error if the input is invalid or the store fails.
pub async fn run_ids(ctx: &Context, args: IdsArgs) -> anyhow::Result<()> {
    let id = if args.timestamp {
        match &args.kind {
            IdKind::Student { year, department } => generate_student_id(*year, department)?,
            IdKind::Employee { department, role } => generate_employee_id(department, role)?,
        }
    } else {
        let store = ctx.open_store()?;
        let generator = IdentifierGenerator::new(&store);
        match &args.kind {
            IdKind::Student { year, department } => {
                generator.next_student_id(*year, department)?
            }
            IdKind::Employee { department, role } => generator.next_employee_id(department, role)?,
        }
    };

    println!("{id}");
    Ok(())
}
