use clap::{Args, Subcommand};
use rebate_app::{context::AppContext, domain::users::records::UserUuid};
use uuid::Uuid;

use super::output;

#[derive(Debug, Args)]
pub(crate) struct AuditCommand {
    #[command(subcommand)]
    command: AuditSubcommand,
}

#[derive(Debug, Subcommand)]
enum AuditSubcommand {
    /// Show a user's audit trail, oldest first
    List(ListAuditArgs),
}

#[derive(Debug, Args)]
struct ListAuditArgs {
    /// User UUID
    #[arg(long)]
    user: Uuid,
}

pub(crate) async fn run(command: AuditCommand, ctx: &AppContext) -> Result<String, String> {
    match command.command {
        AuditSubcommand::List(args) => {
            let entries = ctx
                .discounts
                .audit_trail(UserUuid::from_uuid(args.user))
                .await
                .map_err(|error| format!("failed to list audit entries: {error}"))?;

            if entries.is_empty() {
                return Ok(format!("no audit entries for user {}", args.user));
            }

            Ok(output::table(
                [
                    "created_at",
                    "action",
                    "discount",
                    "amount_before",
                    "amount_after",
                ],
                entries.iter().map(|entry| {
                    let (before, after) = entry.metadata.map_or_else(
                        || ("-".to_string(), "-".to_string()),
                        |amounts| {
                            (
                                output::amount(amounts.amount_before),
                                output::amount(amounts.amount_after),
                            )
                        },
                    );

                    [
                        entry.created_at.to_string(),
                        entry.action.to_string(),
                        entry.discount_uuid.to_string(),
                        before,
                        after,
                    ]
                }),
            ))
        }
    }
}
