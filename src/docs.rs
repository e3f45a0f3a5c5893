use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::auth::register,
        crate::api::auth::login,
        crate::api::auth::me,
        crate::api::cards::upload_cards,
        crate::api::cards::verify_card,
        crate::api::cards::redeem_card,
        crate::api::orders::create_order,
        crate::api::orders::pay_order
    ),
    components(
        schemas(
            crate::api::auth::RegisterRequest,
            crate::api::auth::LoginRequest,
            crate::api::auth::AuthResponse,
            crate::api::cards::CardUploadRequest,
            crate::api::cards::VerifyCardRequest,
            crate::api::cards::RedeemCardRequest,
            crate::api::orders::CreateOrderRequest,
            crate::models::PlanType,
            crate::models::CardStatus,
            crate::models::OrderStatus,
            crate::models::Card,
            crate::models::Order
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration and login"),
        (name = "cards", description = "Card inventory and redemption"),
        (name = "orders", description = "Orders and mock payment")
    )
)]
pub struct ApiDoc;
