use clap::{Args, Subcommand};
use jiff::Timestamp;
use rebate::discounts::{DiscountKind, DiscountRule};
use rebate_app::{
    config::StackingArgs,
    context::AppContext,
    domain::{
        discounts::{data::NewDiscount, records::DiscountUuid},
        users::records::UserUuid,
    },
};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{describe, output};

#[derive(Debug, Args)]
pub(crate) struct DiscountCommand {
    #[command(subcommand)]
    command: DiscountSubcommand,
}

#[derive(Debug, Subcommand)]
enum DiscountSubcommand {
    /// Add a discount to the catalog
    Create(CreateDiscountArgs),

    /// Switch a discount on
    Activate(DiscountArg),

    /// Switch a discount off
    Deactivate(DiscountArg),

    /// Grant a discount to a user, resetting its usage count
    Assign(PairArgs),

    /// Close a user's open assignment of a discount
    Revoke(PairArgs),

    /// List a user's eligible discounts in stacking order
    Eligible(EligibleArgs),

    /// Apply a user's eligible discounts to an amount
    Apply(ApplyArgs),
}

#[derive(Debug, Args)]
struct CreateDiscountArgs {
    /// Display name
    #[arg(long)]
    name: String,

    /// Discount kind (percentage, fixed)
    #[arg(long)]
    kind: DiscountKind,

    /// Percentage points or fixed amount
    #[arg(long)]
    value: Decimal,

    /// RFC 3339 instant from which the discount no longer applies
    #[arg(long)]
    expires_at: Option<Timestamp>,

    /// Maximum applications per user
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    usage_cap: Option<u32>,

    /// Create the discount switched off
    #[arg(long)]
    inactive: bool,

    /// Optional discount UUID; generated when omitted
    #[arg(long)]
    uuid: Option<Uuid>,
}

#[derive(Debug, Args)]
struct DiscountArg {
    /// Discount UUID
    discount: Uuid,
}

#[derive(Debug, Args)]
struct PairArgs {
    /// User UUID
    #[arg(long)]
    user: Uuid,

    /// Discount UUID
    #[arg(long)]
    discount: Uuid,

    /// Instant to record instead of the current time
    #[arg(long)]
    at: Option<Timestamp>,
}

#[derive(Debug, Args)]
struct EligibleArgs {
    /// User UUID
    #[arg(long)]
    user: Uuid,

    /// Instant to evaluate at instead of the current time
    #[arg(long)]
    at: Option<Timestamp>,

    #[command(flatten)]
    stacking: StackingArgs,
}

#[derive(Debug, Args)]
struct ApplyArgs {
    /// User UUID
    #[arg(long)]
    user: Uuid,

    /// Amount to discount
    #[arg(long, allow_hyphen_values = true)]
    amount: Decimal,

    /// Instant to evaluate at instead of the current time
    #[arg(long)]
    at: Option<Timestamp>,

    #[command(flatten)]
    stacking: StackingArgs,
}

pub(crate) async fn run(command: DiscountCommand, ctx: &AppContext) -> Result<String, String> {
    match command.command {
        DiscountSubcommand::Create(args) => create(args, ctx).await,
        DiscountSubcommand::Activate(args) => set_active(args, true, ctx).await,
        DiscountSubcommand::Deactivate(args) => set_active(args, false, ctx).await,
        DiscountSubcommand::Assign(args) => assign(args, ctx).await,
        DiscountSubcommand::Revoke(args) => revoke(args, ctx).await,
        DiscountSubcommand::Eligible(args) => eligible(args, ctx).await,
        DiscountSubcommand::Apply(args) => apply(args, ctx).await,
    }
}

async fn create(args: CreateDiscountArgs, ctx: &AppContext) -> Result<String, String> {
    let mut rule = DiscountRule::new(args.kind, args.value);

    if let Some(expires_at) = args.expires_at {
        rule = rule.expiring_at(expires_at);
    }

    if let Some(usage_cap) = args.usage_cap {
        rule = rule.with_usage_cap(usage_cap);
    }

    if args.inactive {
        rule = rule.inactive();
    }

    let discount = ctx
        .discounts
        .create_discount(NewDiscount {
            uuid: args
                .uuid
                .map_or_else(DiscountUuid::new, DiscountUuid::from_uuid),
            name: args.name,
            rule,
        })
        .await
        .map_err(|error| format!("failed to create discount: {error}"))?;

    Ok(output::discounts([&discount]))
}

async fn set_active(args: DiscountArg, active: bool, ctx: &AppContext) -> Result<String, String> {
    let discount = ctx
        .discounts
        .set_discount_active(DiscountUuid::from_uuid(args.discount), active)
        .await
        .map_err(|error| format!("failed to update discount: {error}"))?;

    Ok(output::discounts([&discount]))
}

async fn assign(args: PairArgs, ctx: &AppContext) -> Result<String, String> {
    let assignment = ctx
        .discounts
        .assign(
            UserUuid::from_uuid(args.user),
            DiscountUuid::from_uuid(args.discount),
            args.at.unwrap_or_else(Timestamp::now),
        )
        .await
        .map_err(|error| format!("failed to assign discount: {error}"))?;

    Ok(output::assignment(&assignment))
}

async fn revoke(args: PairArgs, ctx: &AppContext) -> Result<String, String> {
    let revoked = ctx
        .discounts
        .revoke(
            UserUuid::from_uuid(args.user),
            DiscountUuid::from_uuid(args.discount),
            args.at.unwrap_or_else(Timestamp::now),
        )
        .await
        .map_err(|error| format!("failed to revoke discount: {error}"))?;

    Ok(if revoked {
        "revoked".to_string()
    } else {
        "no open assignment; nothing revoked".to_string()
    })
}

async fn eligible(args: EligibleArgs, ctx: &AppContext) -> Result<String, String> {
    let config = args
        .stacking
        .resolve()
        .map_err(|error| format!("invalid stacking configuration: {}", describe(&error)))?;

    let discounts = ctx
        .discounts
        .eligible_for(
            UserUuid::from_uuid(args.user),
            args.at.unwrap_or_else(Timestamp::now),
            config,
        )
        .await
        .map_err(|error| format!("failed to resolve eligible discounts: {error}"))?;

    if discounts.is_empty() {
        return Ok(format!("no eligible discounts for user {}", args.user));
    }

    Ok(output::discounts(&discounts))
}

async fn apply(args: ApplyArgs, ctx: &AppContext) -> Result<String, String> {
    let config = args
        .stacking
        .resolve()
        .map_err(|error| format!("invalid stacking configuration: {}", describe(&error)))?;

    let final_amount = ctx
        .discounts
        .apply(
            UserUuid::from_uuid(args.user),
            args.amount,
            args.at.unwrap_or_else(Timestamp::now),
            config,
        )
        .await
        .map_err(|error| format!("failed to apply discounts: {error}"))?;

    Ok(output::table(
        ["user", "amount", "final_amount"],
        [[
            args.user.to_string(),
            output::amount(args.amount),
            output::amount(final_amount),
        ]],
    ))
}
