pub mod addresses;
pub mod audit_logs;
pub mod blog_categories;
pub mod blog_posts;
pub mod cart_items;
pub mod colors;
pub mod order_items;
pub mod orders;
pub mod product_images;
pub mod product_variants;
pub mod products;
pub mod returns;
pub mod sizes;
pub mod users;

pub use addresses::Entity as Addresses;
pub use audit_logs::Entity as AuditLogs;
pub use blog_categories::Entity as BlogCategories;
pub use blog_posts::Entity as BlogPosts;
pub use cart_items::Entity as CartItems;
pub use colors::Entity as Colors;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use product_images::Entity as ProductImages;
pub use product_variants::Entity as ProductVariants;
pub use products::Entity as Products;
pub use returns::Entity as Returns;
pub use sizes::Entity as Sizes;
pub use users::Entity as Users;
