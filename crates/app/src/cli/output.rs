//! Table rendering for command output.

use rebate_app::domain::discounts::records::{AssignmentRecord, DiscountRecord};
use rust_decimal::Decimal;
use tabled::{builder::Builder, settings::Style};

pub(crate) fn table<const N: usize, I>(headers: [&str; N], rows: I) -> String
where
    I: IntoIterator<Item = [String; N]>,
{
    let mut builder = Builder::default();

    builder.push_record(headers);

    for row in rows {
        builder.push_record(row);
    }

    let mut table = builder.build();

    table.with(Style::modern_rounded());

    table.to_string()
}

pub(crate) fn amount(value: Decimal) -> String {
    format!("{value:.2}")
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |value| value.to_string())
}

pub(crate) fn discounts<'a, I>(records: I) -> String
where
    I: IntoIterator<Item = &'a DiscountRecord>,
{
    table(
        ["uuid", "name", "kind", "value", "active", "expires_at", "usage_cap"],
        records.into_iter().map(|record| {
            [
                record.uuid.to_string(),
                record.name.clone(),
                record.rule.kind.to_string(),
                record.rule.value.to_string(),
                record.rule.active.to_string(),
                or_dash(record.rule.expires_at),
                or_dash(record.rule.usage_cap),
            ]
        }),
    )
}

pub(crate) fn assignment(record: &AssignmentRecord) -> String {
    table(
        ["user", "discount", "usage_count", "assigned_at", "revoked_at"],
        [[
            record.user_uuid.to_string(),
            record.discount_uuid.to_string(),
            record.usage_count.to_string(),
            record.assigned_at.to_string(),
            or_dash(record.revoked_at),
        ]],
    )
}
