use axum::{
    extract::{OriginalUri, Path, Query, State},
    response::Response,
};
use axum_extra::extract::Multipart;
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    database::Database,
    error::{AppError, AppResult},
    handlers::activities::log_activity,
    middleware::CurrentUser,
    models::{
        adjusted_stock, derive_pricing, Action, CategoryRequest, EntityType, Product,
        ProductCategory, ProductListItem, ProductRequest, StockAdjustmentRequest, PRODUCT_SELECT,
    },
    state::AppState,
    utils::{
        media::{read_image_field, save_image},
        pagination::{PageQuery, PageRequest, Paginated},
        response,
        validation::{like_pattern, optional_text, require},
        ApiJson,
    },
};

// ---- categories ----

pub async fn categories_list(State(db): State<Database>, user: CurrentUser) -> AppResult<Response> {
    let categories = sqlx::query_as::<_, ProductCategory>(
        "SELECT * FROM product_categories WHERE user_id = $1 AND is_deleted = FALSE ORDER BY created_at DESC",
    )
    .bind(user.id)
    .fetch_all(&db)
    .await?;

    Ok(response::ok("Product Categories fetched successfully.", categories))
}

async fn category_name_taken(db: &Database, user_id: Uuid, name: &str, except: Option<Uuid>) -> AppResult<bool> {
    let taken = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM product_categories
            WHERE user_id = $1 AND category_name = $2 AND is_deleted = FALSE
              AND ($3::uuid IS NULL OR id <> $3)
        )
        "#,
    )
    .bind(user_id)
    .bind(name)
    .bind(except)
    .fetch_one(db)
    .await?;
    Ok(taken)
}

pub async fn create_category(
    State(db): State<Database>,
    user: CurrentUser,
    ApiJson(body): ApiJson<CategoryRequest>,
) -> AppResult<Response> {
    let name = require(&body.category_name, "Product Category Name Is required")?.to_lowercase();

    if category_name_taken(&db, user.id, &name, None).await? {
        return Err(AppError::validation("Product Category Name already exists"));
    }

    let category = sqlx::query_as::<_, ProductCategory>(
        "INSERT INTO product_categories (user_id, category_name, is_active) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(user.id)
    .bind(&name)
    .bind(body.is_active.unwrap_or(true))
    .fetch_one(&db)
    .await?;

    log_activity(
        &db,
        user.id,
        Action::Created,
        EntityType::ProductCategory,
        Some(category.id),
        format!("Added category {}", category.category_name),
    )
    .await;

    Ok(response::created("Product Category added successfully.", category))
}

async fn find_category(db: &Database, user_id: Uuid, category_id: Uuid) -> AppResult<ProductCategory> {
    sqlx::query_as::<_, ProductCategory>(
        "SELECT * FROM product_categories WHERE id = $1 AND user_id = $2 AND is_deleted = FALSE",
    )
    .bind(category_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::not_found("Product Category Not Found."))
}

pub async fn category_detail(
    State(db): State<Database>,
    user: CurrentUser,
    Path(category_id): Path<Uuid>,
) -> AppResult<Response> {
    let category = find_category(&db, user.id, category_id).await?;
    Ok(response::ok("Product Category fetched successfully.", category))
}

pub async fn update_category(
    State(db): State<Database>,
    user: CurrentUser,
    Path(category_id): Path<Uuid>,
    ApiJson(body): ApiJson<CategoryRequest>,
) -> AppResult<Response> {
    let current = find_category(&db, user.id, category_id).await?;

    let name = match &body.category_name {
        Some(_) => require(&body.category_name, "Product Category Name Is required")?.to_lowercase(),
        None => current.category_name.clone(),
    };
    if category_name_taken(&db, user.id, &name, Some(current.id)).await? {
        return Err(AppError::validation("Product Category Name already exists"));
    }

    let category = sqlx::query_as::<_, ProductCategory>(
        r#"
        UPDATE product_categories SET category_name = $1, is_active = $2, updated_at = NOW()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(&name)
    .bind(body.is_active.unwrap_or(current.is_active))
    .bind(current.id)
    .fetch_one(&db)
    .await?;

    log_activity(
        &db,
        user.id,
        Action::Updated,
        EntityType::ProductCategory,
        Some(category.id),
        format!("Updated category {}", category.category_name),
    )
    .await;

    Ok(response::ok("Product Category updated successfully.", category))
}

pub async fn delete_category(
    State(db): State<Database>,
    user: CurrentUser,
    Path(category_id): Path<Uuid>,
) -> AppResult<Response> {
    let category = find_category(&db, user.id, category_id).await?;

    let in_use = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM products WHERE category_id = $1 AND is_deleted = FALSE)",
    )
    .bind(category.id)
    .fetch_one(&db)
    .await?;
    if in_use {
        return Err(AppError::validation("Product Category is used by existing products."));
    }

    sqlx::query("UPDATE product_categories SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(category.id)
        .execute(&db)
        .await?;

    log_activity(
        &db,
        user.id,
        Action::Deleted,
        EntityType::ProductCategory,
        Some(category.id),
        format!("Deleted category {}", category.category_name),
    )
    .await;

    Ok(response::message("Product Category deleted successfully."))
}

// ---- products ----

#[derive(Debug, Deserialize)]
pub struct ProductFilters {
    search: Option<String>,
    category: Option<String>,
    low_stock: Option<String>,
    #[serde(flatten)]
    page: PageQuery,
}

struct ProductScope {
    user_id: Uuid,
    search: Option<String>,
    category_id: Option<Uuid>,
    low_stock: bool,
}

impl ProductScope {
    fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE p.user_id = ");
        builder.push_bind(self.user_id);
        builder.push(" AND p.is_deleted = FALSE");

        if let Some(search) = &self.search {
            let pattern = like_pattern(search);
            builder.push(" AND (p.name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" ESCAPE '\\' OR p.item_sku ILIKE ");
            builder.push_bind(pattern);
            builder.push(" ESCAPE '\\')");
        }
        if let Some(category_id) = self.category_id {
            builder.push(" AND p.category_id = ");
            builder.push_bind(category_id);
        }
        if self.low_stock {
            builder.push(" AND p.is_track_inventory = TRUE AND p.stock_level <= p.reorder_point");
        }
    }
}

pub async fn products_list(
    State(db): State<Database>,
    user: CurrentUser,
    OriginalUri(uri): OriginalUri,
    Query(filters): Query<ProductFilters>,
) -> AppResult<Paginated<ProductListItem>> {
    let request = PageRequest::from_query(&filters.page)?;

    let category_id = match optional_text(filters.category) {
        Some(raw) => Some(Uuid::parse_str(&raw).map_err(|_| AppError::validation("Invalid Product Category."))?),
        None => None,
    };
    let scope = ProductScope {
        user_id: user.id,
        search: optional_text(filters.search),
        category_id,
        low_stock: filters.low_stock.as_deref() == Some("true"),
    };

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products p");
    scope.push_where(&mut count);
    let total: i64 = count.build_query_scalar().fetch_one(&db).await?;

    request.ensure_in_range(total)?;

    let mut rows = QueryBuilder::<Postgres>::new(PRODUCT_SELECT);
    scope.push_where(&mut rows);
    rows.push(" ORDER BY p.created_at DESC LIMIT ");
    rows.push_bind(request.limit());
    rows.push(" OFFSET ");
    rows.push_bind(request.offset());

    let products = rows.build_query_as::<Product>().fetch_all(&db).await?;
    let results = products.into_iter().map(ProductListItem::from).collect();

    Ok(Paginated::new(results, total, request, uri))
}

/// The category must be one of the caller's active categories.
async fn ensure_active_category(db: &Database, user_id: Uuid, category_id: Uuid) -> AppResult<()> {
    let valid = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM product_categories
            WHERE id = $1 AND user_id = $2 AND is_active = TRUE AND is_deleted = FALSE
        )
        "#,
    )
    .bind(category_id)
    .bind(user_id)
    .fetch_one(db)
    .await?;

    if valid {
        Ok(())
    } else {
        Err(AppError::validation("Invalid Product Category."))
    }
}

fn check_product_numbers(body: &ProductRequest) -> AppResult<()> {
    let negative_price = [body.selling_price, body.cost_price, body.weight]
        .iter()
        .flatten()
        .any(|value| value.is_sign_negative());
    if negative_price {
        return Err(AppError::validation("Prices and weight cannot be negative."));
    }

    let bad_percent = [body.discount_percentage, body.gst_category]
        .iter()
        .flatten()
        .any(|value| value.is_sign_negative() || *value > rust_decimal::Decimal::ONE_HUNDRED);
    if bad_percent {
        return Err(AppError::validation("Percentages must be between 0 and 100."));
    }

    if body.stock_level.map_or(false, |level| level < 0) || body.reorder_point.map_or(false, |level| level < 0) {
        return Err(AppError::validation("Stock levels cannot be negative."));
    }

    Ok(())
}

pub async fn find_product(db: &Database, user_id: Uuid, product_id: Uuid) -> AppResult<Product> {
    let query = format!("{} WHERE p.id = $1 AND p.user_id = $2 AND p.is_deleted = FALSE", PRODUCT_SELECT);
    sqlx::query_as::<_, Product>(&query)
        .bind(product_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Product Not Found."))
}

pub async fn create_product(
    State(db): State<Database>,
    user: CurrentUser,
    ApiJson(body): ApiJson<ProductRequest>,
) -> AppResult<Response> {
    let name = require(&body.name, "Product Name is required.")?.to_string();
    let item_sku = require(&body.item_sku, "Item SKU is required.")?.to_string();
    let category_id = body
        .category
        .ok_or_else(|| AppError::validation("Product Category is required."))?;
    check_product_numbers(&body)?;
    ensure_active_category(&db, user.id, category_id).await?;

    let pricing = derive_pricing(body.selling_price, body.cost_price, body.discount_percentage, body.gst_category);

    let product_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO products (user_id, category_id, name, item_sku, description, unit_of_measurement,
                              stock_level, reorder_point, weight, selling_price, cost_price,
                              profit_margin, tax, gst_category, discount_percentage, final_price,
                              is_track_inventory, is_inter_state_sale, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
        RETURNING id
        "#,
    )
    .bind(user.id)
    .bind(category_id)
    .bind(&name)
    .bind(&item_sku)
    .bind(optional_text(body.description))
    .bind(optional_text(body.unit_of_measurement))
    .bind(body.stock_level.unwrap_or(0))
    .bind(body.reorder_point.unwrap_or(0))
    .bind(body.weight)
    .bind(body.selling_price)
    .bind(body.cost_price)
    .bind(pricing.profit_margin)
    .bind(optional_text(body.tax))
    .bind(body.gst_category)
    .bind(body.discount_percentage)
    .bind(pricing.final_price)
    .bind(body.is_track_inventory.unwrap_or(false))
    .bind(body.is_inter_state_sale.unwrap_or(false))
    .bind(body.is_active.unwrap_or(true))
    .fetch_one(&db)
    .await?;

    let product = find_product(&db, user.id, product_id).await?;

    log_activity(
        &db,
        user.id,
        Action::Created,
        EntityType::Product,
        Some(product.id),
        format!("Added product {} ({})", product.name, product.item_sku),
    )
    .await;

    Ok(response::created("Product added successfully.", product))
}

pub async fn product_detail(
    State(db): State<Database>,
    user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Response> {
    let product = find_product(&db, user.id, product_id).await?;
    Ok(response::ok("Product fetched successfully.", product))
}

pub async fn update_product(
    State(db): State<Database>,
    user: CurrentUser,
    Path(product_id): Path<Uuid>,
    ApiJson(body): ApiJson<ProductRequest>,
) -> AppResult<Response> {
    let current = find_product(&db, user.id, product_id).await?;
    check_product_numbers(&body)?;

    let name = match &body.name {
        Some(_) => require(&body.name, "Product Name is required.")?.to_string(),
        None => current.name.clone(),
    };
    let item_sku = match &body.item_sku {
        Some(_) => require(&body.item_sku, "Item SKU is required.")?.to_string(),
        None => current.item_sku.clone(),
    };
    let category_id = match body.category {
        Some(category_id) if category_id != current.category_id => {
            ensure_active_category(&db, user.id, category_id).await?;
            category_id
        }
        _ => current.category_id,
    };

    let selling_price = body.selling_price.or(current.selling_price);
    let cost_price = body.cost_price.or(current.cost_price);
    let discount_percentage = body.discount_percentage.or(current.discount_percentage);
    let gst_category = body.gst_category.or(current.gst_category);
    let pricing = derive_pricing(selling_price, cost_price, discount_percentage, gst_category);

    sqlx::query(
        r#"
        UPDATE products
        SET category_id = $1, name = $2, item_sku = $3, description = $4, unit_of_measurement = $5,
            stock_level = $6, reorder_point = $7, weight = $8, selling_price = $9, cost_price = $10,
            profit_margin = $11, tax = $12, gst_category = $13, discount_percentage = $14,
            final_price = $15, is_track_inventory = $16, is_inter_state_sale = $17, is_active = $18,
            updated_at = NOW()
        WHERE id = $19
        "#,
    )
    .bind(category_id)
    .bind(&name)
    .bind(&item_sku)
    .bind(optional_text(body.description).or_else(|| current.description.clone()))
    .bind(optional_text(body.unit_of_measurement).or_else(|| current.unit_of_measurement.clone()))
    .bind(body.stock_level.unwrap_or(current.stock_level))
    .bind(body.reorder_point.unwrap_or(current.reorder_point))
    .bind(body.weight.or(current.weight))
    .bind(selling_price)
    .bind(cost_price)
    .bind(pricing.profit_margin)
    .bind(optional_text(body.tax).or_else(|| current.tax.clone()))
    .bind(gst_category)
    .bind(discount_percentage)
    .bind(pricing.final_price)
    .bind(body.is_track_inventory.unwrap_or(current.is_track_inventory))
    .bind(body.is_inter_state_sale.unwrap_or(current.is_inter_state_sale))
    .bind(body.is_active.unwrap_or(current.is_active))
    .bind(current.id)
    .execute(&db)
    .await?;

    let product = find_product(&db, user.id, current.id).await?;

    log_activity(
        &db,
        user.id,
        Action::Updated,
        EntityType::Product,
        Some(product.id),
        format!("Updated product {}", product.name),
    )
    .await;

    Ok(response::ok("Product updated successfully.", product))
}

pub async fn delete_product(
    State(db): State<Database>,
    user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Response> {
    let product = find_product(&db, user.id, product_id).await?;

    sqlx::query("UPDATE products SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(product.id)
        .execute(&db)
        .await?;

    log_activity(
        &db,
        user.id,
        Action::Deleted,
        EntityType::Product,
        Some(product.id),
        format!("Deleted product {}", product.name),
    )
    .await;

    Ok(response::message("Product deleted successfully."))
}

pub async fn upload_product_image(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(product_id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Response> {
    let product = find_product(&state.db, user.id, product_id).await?;

    let upload = read_image_field(multipart, "product_image")
        .await?
        .ok_or_else(|| AppError::validation("Please Select Valid Image."))?;
    let path = save_image(&state.config.media_root, "product_images", upload, "Please Select Valid Image.").await?;

    sqlx::query("UPDATE products SET product_image = $1, updated_at = NOW() WHERE id = $2")
        .bind(&path)
        .bind(product.id)
        .execute(&state.db)
        .await?;

    let product = find_product(&state.db, user.id, product.id).await?;
    Ok(response::ok("Product image updated successfully.", product))
}

pub async fn adjust_stock(
    State(db): State<Database>,
    user: CurrentUser,
    Path(product_id): Path<Uuid>,
    ApiJson(body): ApiJson<StockAdjustmentRequest>,
) -> AppResult<Response> {
    let delta = body
        .quantity
        .filter(|quantity| *quantity != 0)
        .ok_or_else(|| AppError::validation("Quantity is required."))?;
    let reason = require(&body.reason, "Reason is required.")?.to_string();

    let product = find_product(&db, user.id, product_id).await?;
    let new_level = adjusted_stock(product.stock_level, delta)
        .ok_or_else(|| AppError::validation("Insufficient stock."))?;

    // Only applies if the level is unchanged since it was read.
    let updated = sqlx::query(
        "UPDATE products SET stock_level = $1, updated_at = NOW() WHERE id = $2 AND stock_level = $3",
    )
    .bind(new_level)
    .bind(product.id)
    .bind(product.stock_level)
    .execute(&db)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(AppError::Conflict("Stock changed while adjusting. Please retry.".to_string()));
    }

    log_activity(
        &db,
        user.id,
        Action::StockAdjusted,
        EntityType::Product,
        Some(product.id),
        format!("Stock of {} changed by {} ({})", product.name, delta, reason),
    )
    .await;

    let product = find_product(&db, user.id, product.id).await?;
    Ok(response::ok("Stock adjusted successfully.", product))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_search_escapes_wildcards_and_skips_deleted() {
        let scope = ProductScope {
            user_id: Uuid::new_v4(),
            search: Some("SKU_1".to_string()),
            category_id: None,
            low_stock: false,
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT p.id FROM products p");
        scope.push_where(&mut builder);
        let sql = builder.sql();
        assert!(sql.contains("p.is_deleted = FALSE"));
        assert!(sql.contains("p.name ILIKE $2 ESCAPE '\\' OR p.item_sku ILIKE $3 ESCAPE '\\'"));
    }
}
