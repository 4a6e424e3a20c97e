//! Test Helpers

use rebate::discounts::DiscountRule;

use crate::{
    domain::{
        discounts::{
            DiscountsService, DiscountsServiceError, data::NewDiscount, records::DiscountUuid,
        },
        users::{UsersService, UsersServiceError, data::NewUser, records::UserUuid},
    },
    test::TestContext,
};

pub(crate) async fn create_user(ctx: &TestContext, name: &str) -> Result<UserUuid, UsersServiceError> {
    let user = ctx
        .users
        .create_user(NewUser {
            uuid: UserUuid::new(),
            name: name.to_string(),
        })
        .await?;

    Ok(user.uuid)
}

pub(crate) async fn create_discount(
    ctx: &TestContext,
    rule: DiscountRule,
) -> Result<DiscountUuid, DiscountsServiceError> {
    let discount = ctx
        .discounts
        .create_discount(NewDiscount {
            uuid: DiscountUuid::new(),
            name: format!("{} {}", rule.value, rule.kind),
            rule,
        })
        .await?;

    Ok(discount.uuid)
}
