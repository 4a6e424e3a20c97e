use clap::{Args, Subcommand};
use rebate_app::{
    context::AppContext,
    domain::users::{data::NewUser, records::UserUuid},
};
use uuid::Uuid;

use super::output;

#[derive(Debug, Args)]
pub(crate) struct UserCommand {
    #[command(subcommand)]
    command: UserSubcommand,
}

#[derive(Debug, Subcommand)]
enum UserSubcommand {
    /// Register a user the ledger can reference
    Create(CreateUserArgs),
}

#[derive(Debug, Args)]
struct CreateUserArgs {
    /// Display name
    #[arg(long)]
    name: String,

    /// Optional user UUID; generated when omitted
    #[arg(long)]
    uuid: Option<Uuid>,
}

pub(crate) async fn run(command: UserCommand, ctx: &AppContext) -> Result<String, String> {
    match command.command {
        UserSubcommand::Create(args) => {
            let user = ctx
                .users
                .create_user(NewUser {
                    uuid: args.uuid.map_or_else(UserUuid::new, UserUuid::from_uuid),
                    name: args.name,
                })
                .await
                .map_err(|error| format!("failed to create user: {error}"))?;

            Ok(output::table(
                ["uuid", "name", "created_at"],
                [[
                    user.uuid.to_string(),
                    user.name,
                    user.created_at.to_string(),
                ]],
            ))
        }
    }
}
