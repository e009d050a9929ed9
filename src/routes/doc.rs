use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        account::{AddressList, AddressRequest, ProfileView, UpdateProfileRequest},
        auth::{LoginResponse, OtpLoginRequest, OtpRequested, OtpResendRequest, OtpVerifyRequest},
        blog::{BlogOverview, CategoryPosts, CategoryRequest, PostRequest},
        cart::{AddToCartRequest, CartView, UpdateCartRequest},
        orders::{
            CheckoutRequest, OrderList, OrderWithItems, ReturnCreated, ReturnOrderRequest,
            UpdateOrderStatusRequest,
        },
        products::{
            CatalogChoices, CategoryChoice, ProductList, ProductTypeChoice, UpdateVariantRequest,
        },
    },
    entity::{
        orders::{OrderStatus, PaymentStatus},
        products::{Category, ProductType},
        returns::{ReturnReason, ReturnStatus},
    },
    models::{
        Address, BlogCategory, BlogPost, CartItem, CartLine, ColorOption, Order, OrderItem, Product,
        ProductDetail, ProductImage, ReturnRequest, SizeOption, User, Variant,
    },
    response::{ApiResponse, Meta},
    routes::{account, admin, auth, blog, cart, health, orders, params, shop},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::verify_otp,
        auth::resend_otp,
        account::profile,
        account::update_profile,
        account::list_addresses,
        account::add_address,
        account::delete_address,
        shop::list_products,
        shop::get_product,
        shop::choices,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_cart,
        cart::remove_from_cart,
        orders::checkout,
        orders::list_orders,
        orders::get_order,
        orders::cancel_order,
        orders::initiate_return,
        orders::return_order,
        blog::overview,
        blog::get_post,
        blog::category_posts,
        admin::update_variant,
        admin::update_order_status,
        admin::create_post,
        admin::update_post,
        admin::delete_post,
        admin::upsert_category
    ),
    components(
        schemas(
            User,
            Address,
            Product,
            ProductImage,
            Variant,
            SizeOption,
            ColorOption,
            ProductDetail,
            CartItem,
            CartLine,
            Order,
            OrderItem,
            ReturnRequest,
            BlogCategory,
            BlogPost,
            Category,
            ProductType,
            OrderStatus,
            PaymentStatus,
            ReturnReason,
            ReturnStatus,
            OtpLoginRequest,
            OtpResendRequest,
            OtpVerifyRequest,
            OtpRequested,
            LoginResponse,
            UpdateProfileRequest,
            AddressRequest,
            AddressList,
            ProfileView,
            ProductList,
            CategoryChoice,
            ProductTypeChoice,
            CatalogChoices,
            UpdateVariantRequest,
            AddToCartRequest,
            UpdateCartRequest,
            CartView,
            CheckoutRequest,
            ReturnOrderRequest,
            UpdateOrderStatusRequest,
            OrderWithItems,
            OrderList,
            ReturnCreated,
            BlogOverview,
            CategoryPosts,
            PostRequest,
            CategoryRequest,
            health::HealthData,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<ProductDetail>,
            ApiResponse<ProductList>,
            ApiResponse<CartView>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<ProfileView>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "One-time code login"),
        (name = "Account", description = "Profile and saved addresses"),
        (name = "Shop", description = "Catalog browsing"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Checkout, order history, cancellation and returns"),
        (name = "Blog", description = "Blog read endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_checkout_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/checkout"));
        assert!(doc.paths.paths.contains_key("/return-order/{id}"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
