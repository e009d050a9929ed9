use footwear_store_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    entity::{
        colors::is_valid_hex_code,
        products::{Category, ProductType},
        sizes::{self, MAX_SIZE, MIN_SIZE},
    },
};
use sea_orm::ActiveEnum;
use uuid::Uuid;

const COLORS: &[(&str, &str)] = &[
    ("#000000", "Black"),
    ("#FFFFFF", "White"),
    ("#8B4513", "Brown"),
    ("#1E3A8A", "Navy"),
    ("#B91C1C", "Red"),
];

struct SeedProduct {
    name: &'static str,
    description: &'static str,
    price: i64,
    category: Category,
    product_type: ProductType,
    colors: &'static [&'static str],
    sizes: std::ops::RangeInclusive<i32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "admin", "admin").await?;
    let user_id = ensure_user(&pool, "user@example.com", "shopper", "user").await?;
    seed_colors(&pool).await?;
    seed_sizes(&pool).await?;
    seed_products(&pool).await?;
    seed_blog(&pool, admin_id).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    username: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, username, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(username)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(id)
}

async fn seed_colors(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    for (code, name) in COLORS {
        anyhow::ensure!(is_valid_hex_code(code), "bad color code {code}");
        sqlx::query(
            "INSERT INTO colors (id, code, name) VALUES ($1, $2, $3) ON CONFLICT (code) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(*code)
        .bind(*name)
        .execute(pool)
        .await?;
    }
    println!("Seeded colors");
    Ok(())
}

async fn seed_sizes(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    for code in MIN_SIZE..=MAX_SIZE {
        sqlx::query("INSERT INTO sizes (id, code) VALUES ($1, $2) ON CONFLICT (code) DO NOTHING")
            .bind(Uuid::new_v4())
            .bind(code)
            .execute(pool)
            .await?;
    }
    println!("Seeded sizes {} to {}", sizes::label(MIN_SIZE), sizes::label(MAX_SIZE));
    Ok(())
}

fn catalog() -> Vec<SeedProduct> {
    vec![
        SeedProduct {
            name: "Trail Runner",
            description: "Lightweight trail sneaker with a grippy outsole",
            price: 8_999,
            category: Category::Men,
            product_type: ProductType::Sneakers,
            colors: &["#000000", "#1E3A8A"],
            sizes: 7..=11,
        },
        SeedProduct {
            name: "Chelsea Boot",
            description: "Leather chelsea boot with elastic side panels",
            price: 12_950,
            category: Category::Women,
            product_type: ProductType::Boots,
            colors: &["#8B4513", "#000000"],
            sizes: 5..=9,
        },
        SeedProduct {
            name: "Beach Sandal",
            description: "Quick-dry sandal for the boardwalk",
            price: 2_450,
            category: Category::Kids,
            product_type: ProductType::Sandals,
            colors: &["#B91C1C", "#FFFFFF"],
            sizes: 4..=7,
        },
        SeedProduct {
            name: "School Oxford",
            description: "Polishable uniform shoe",
            price: 4_200,
            category: Category::Kids,
            product_type: ProductType::UniformShoes,
            colors: &["#000000"],
            sizes: 4..=8,
        },
    ]
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    for product in catalog() {
        anyhow::ensure!(
            product.sizes.clone().all(sizes::is_valid_code),
            "{} has a size outside the size chart",
            product.name
        );
        let (product_id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO products (id, name, description, price, category, product_type)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (name) DO UPDATE SET description = EXCLUDED.description
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(product.name)
        .bind(product.description)
        .bind(product.price)
        .bind(product.category.to_value())
        .bind(product.product_type.to_value())
        .fetch_one(pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO product_images (id, product_id, image_url, position)
            SELECT $1, $2, $3, 0
            WHERE NOT EXISTS (SELECT 1 FROM product_images WHERE product_id = $2)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(product_id)
        .bind(format!("/media/products/{product_id}/cover.jpg"))
        .execute(pool)
        .await?;

        for color in product.colors {
            for size in product.sizes.clone() {
                sqlx::query(
                    r#"
                    INSERT INTO product_variants (id, product_id, color_id, size_id, stock, price)
                    SELECT $1, $2, c.id, s.id, 10, $3
                    FROM colors c, sizes s
                    WHERE c.code = $4 AND s.code = $5
                    ON CONFLICT (product_id, color_id, size_id) DO NOTHING
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(product_id)
                .bind(product.price)
                .bind(*color)
                .bind(size)
                .execute(pool)
                .await?;
            }
        }
    }

    println!("Seeded products");
    Ok(())
}

async fn seed_blog(pool: &sqlx::PgPool, author_id: Uuid) -> anyhow::Result<()> {
    let (category_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO blog_categories (id, name, slug)
        VALUES ($1, 'Shoe Care', 'shoe-care')
        ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .fetch_one(pool)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO blog_posts (id, title, slug, category_id, author_id, content, excerpt, is_featured)
        SELECT $1, 'Keeping leather boots winter-ready', 'leather-boots-winter', $2, $3,
               'Clean, condition and waterproof before the first frost.',
               'Three steps for boots that last.', TRUE
        WHERE NOT EXISTS (SELECT 1 FROM blog_posts WHERE slug = 'leather-boots-winter')
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(category_id)
    .bind(author_id)
    .execute(pool)
    .await?;

    println!("Seeded blog");
    Ok(())
}
