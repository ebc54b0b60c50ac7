use std::collections::{HashMap, HashSet};
use anyhow::{anyhow, bail, Context};
use bb8_postgres::bb8::{Pool, PooledConnection};
use bb8_postgres::PostgresConnectionManager;
use bb8_postgres::tokio_postgres::error::SqlState;
use bb8_postgres::tokio_postgres::{NoTls, Row};
use time::OffsetDateTime;
use tracing::warn;
use crate::models::menu::MenuEntry;
use crate::models::order::{NewOrder, Order, OrderItem, OrderStatus, OrderUpdate, PaymentMethod};
use crate::models::place::{Coordinates, Place};
use crate::models::product::{Product, ProductCategory};
use crate::models::restaurant::Restaurant;

pub const RETRY_LIMIT: usize = 5;

const ORDER_COLUMNS: &str = "id, firstname, lastname, phonenumber, address, status, payment_method, \
    comment, registered_at, called_at, delivered_at, restaurant_id";

const PRODUCT_SELECT: &str = "SELECT p.id, p.name, p.price, p.image, p.special_status, p.description, \
    c.id AS category_id, c.name AS category_name \
    FROM products p LEFT JOIN product_categories c ON c.id = p.category_id";

pub struct PostgresConnectionRepo {
    postgres_connection: Pool<PostgresConnectionManager<NoTls>>,
}

impl PostgresConnectionRepo {
    pub fn new(
        postgres_connection: Pool<PostgresConnectionManager<NoTls>>,
    ) -> Self {
        Self {
            postgres_connection
        }
    }

    async fn get_postgres_connection(
        &self,
    ) -> anyhow::Result<PooledConnection<PostgresConnectionManager<NoTls>>> {
        for _ in 0..RETRY_LIMIT {
            match self.postgres_connection.get().await {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    warn!("Failed to retrieve postgres connection due to: {}, retrying in 3s", e);
                    tokio::time::sleep(tokio::time::Duration::from_secs(3)).await;
                    continue;
                }
            }
        }

        Err(anyhow!("Failed to retrieve a valid connection from postgres pool, BAILING"))
    }

    pub async fn retrieve_restaurants(
        &self,
    ) -> anyhow::Result<Vec<Restaurant>> {
        let conn = self.get_postgres_connection().await?;
        let rows = conn
            .query("SELECT id, name, address, contact_phone FROM restaurants ORDER BY name, id;", &[])
            .await
            .context("Failed to retrieve restaurants")?;

        Ok(rows.iter().map(parse_row_into_restaurant).collect())
    }

    pub async fn retrieve_restaurant(
        &self,
        restaurant_id: i32,
    ) -> anyhow::Result<Option<Restaurant>> {
        let conn = self.get_postgres_connection().await?;
        let row = conn
            .query_opt(
                "SELECT id, name, address, contact_phone FROM restaurants WHERE id = $1;",
                &[&restaurant_id],
            )
            .await
            .with_context(|| format!("Failed to retrieve restaurant with id: {}", restaurant_id))?;

        Ok(row.as_ref().map(parse_row_into_restaurant))
    }

    pub async fn retrieve_products(
        &self,
    ) -> anyhow::Result<Vec<Product>> {
        let conn = self.get_postgres_connection().await?;
        let stmt = format!("{} ORDER BY p.id;", PRODUCT_SELECT);
        let rows = conn
            .query(&stmt, &[])
            .await
            .context("Failed to retrieve products")?;

        Ok(rows.iter().map(parse_row_into_product).collect())
    }

    /// Products stocked by at least one restaurant.
    pub async fn retrieve_available_products(
        &self,
    ) -> anyhow::Result<Vec<Product>> {
        let conn = self.get_postgres_connection().await?;
        let stmt = format!(
            "{} WHERE EXISTS (SELECT 1 FROM menu_items m WHERE m.product_id = p.id AND m.availability) ORDER BY p.id;",
            PRODUCT_SELECT
        );
        let rows = conn
            .query(&stmt, &[])
            .await
            .context("Failed to retrieve available products")?;

        Ok(rows.iter().map(parse_row_into_product).collect())
    }

    pub async fn retrieve_existing_product_ids(
        &self,
        product_ids: &[i32],
    ) -> anyhow::Result<HashSet<i32>> {
        let conn = self.get_postgres_connection().await?;
        let rows = conn
            .query("SELECT id FROM products WHERE id = ANY($1);", &[&product_ids])
            .await
            .context("Failed to check product ids")?;

        Ok(rows.iter().map(|row| row.get::<&str, i32>("id")).collect())
    }

    pub async fn retrieve_menu_entries(
        &self,
    ) -> anyhow::Result<Vec<MenuEntry>> {
        let conn = self.get_postgres_connection().await?;
        let rows = conn
            .query("SELECT restaurant_id, product_id, availability FROM menu_items;", &[])
            .await
            .context("Failed to retrieve menu entries")?;

        Ok(rows.iter().map(parse_row_into_menu_entry).collect())
    }

    /// Returns `false` when the restaurant or the product does not exist.
    pub async fn upsert_menu_entry(
        &self,
        entry: &MenuEntry,
    ) -> anyhow::Result<bool> {
        let conn = self.get_postgres_connection().await?;
        let res = conn
            .execute(
                "INSERT INTO menu_items (restaurant_id, product_id, availability) VALUES ($1, $2, $3) \
                ON CONFLICT (restaurant_id, product_id) DO UPDATE SET availability = EXCLUDED.availability;",
                &[&entry.restaurant_id, &entry.product_id, &entry.availability],
            )
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(e) if e.code() == Some(&SqlState::FOREIGN_KEY_VIOLATION) => {
                warn!(
                    "Rejected menu entry for restaurant: {}, product: {}, due to: {}",
                    entry.restaurant_id, entry.product_id, e
                );
                Ok(false)
            }
            Err(e) => Err(e).context("Failed to store menu entry"),
        }
    }

    /// Returns `false` when there was nothing to remove.
    pub async fn remove_menu_entry(
        &self,
        restaurant_id: i32,
        product_id: i32,
    ) -> anyhow::Result<bool> {
        let conn = self.get_postgres_connection().await?;
        let removed = conn
            .execute(
                "DELETE FROM menu_items WHERE restaurant_id = $1 AND product_id = $2;",
                &[&restaurant_id, &product_id],
            )
            .await
            .context("Failed to remove menu entry")?;

        Ok(removed > 0)
    }

    /// Every order that is not done, fresh statuses first, oldest first.
    pub async fn retrieve_pending_orders(
        &self,
    ) -> anyhow::Result<Vec<Order>> {
        let conn = self.get_postgres_connection().await?;
        let stmt = format!(
            "SELECT {} FROM orders WHERE status <> $1;",
            ORDER_COLUMNS
        );
        let rows = conn
            .query(&stmt, &[&OrderStatus::Done.as_str()])
            .await
            .context("Failed to retrieve pending orders")?;

        let mut orders = rows
            .iter()
            .map(parse_row_into_order)
            .collect::<anyhow::Result<Vec<Order>>>()?;

        let order_ids: Vec<i32> = orders.iter().map(|order| order.id).collect();
        let item_rows = conn
            .query(
                "SELECT order_id, product_id, quantity, price FROM order_items WHERE order_id = ANY($1) ORDER BY id;",
                &[&order_ids],
            )
            .await
            .context("Failed to retrieve order items")?;

        let mut items: HashMap<i32, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            items
                .entry(row.get::<&str, i32>("order_id"))
                .or_default()
                .push(parse_row_into_order_item(&row));
        }
        for order in orders.iter_mut() {
            order.items = items.remove(&order.id).unwrap_or_default();
        }

        orders.sort_by(|a, b| {
            a.status
                .cmp(&b.status)
                .then(a.registered_at.cmp(&b.registered_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(orders)
    }

    /// Inserts the order and its items in one transaction. Item prices are
    /// copied from the current product prices.
    pub async fn create_order(
        &self,
        new_order: &NewOrder,
    ) -> anyhow::Result<Order> {
        let mut conn = self.get_postgres_connection().await?;
        let tx = conn.transaction().await.context("Failed to start order transaction")?;

        let stmt = format!(
            "INSERT INTO orders (firstname, lastname, phonenumber, address, status) \
            VALUES ($1, $2, $3, $4, $5) RETURNING {};",
            ORDER_COLUMNS
        );
        let row = tx
            .query_one(
                &stmt,
                &[
                    &new_order.firstname,
                    &new_order.lastname,
                    &new_order.phonenumber,
                    &new_order.address,
                    &OrderStatus::Raw.as_str(),
                ],
            )
            .await
            .context("Failed to insert order")?;
        let mut order = parse_row_into_order(&row)?;

        for line in &new_order.lines {
            let row = tx
                .query_opt(
                    "INSERT INTO order_items (order_id, product_id, quantity, price) \
                    SELECT $1, id, $3, price FROM products WHERE id = $2 \
                    RETURNING product_id, quantity, price;",
                    &[&order.id, &line.product_id, &line.quantity],
                )
                .await
                .context("Failed to insert order item")?;

            match row {
                Some(row) => order.items.push(parse_row_into_order_item(&row)),
                None => bail!("Product {} no longer exists", line.product_id),
            }
        }

        tx.commit().await.context("Failed to commit order")?;
        Ok(order)
    }

    pub async fn update_order(
        &self,
        order_id: i32,
        update: OrderUpdate,
    ) -> anyhow::Result<Option<Order>> {
        let mut conn = self.get_postgres_connection().await?;
        let tx = conn.transaction().await.context("Failed to start order transaction")?;

        let stmt = format!("SELECT {} FROM orders WHERE id = $1 FOR UPDATE;", ORDER_COLUMNS);
        let Some(row) = tx
            .query_opt(&stmt, &[&order_id])
            .await
            .context("Failed to retrieve order")?
        else {
            return Ok(None);
        };

        let mut order = parse_row_into_order(&row)?;
        order.apply_update(update, OffsetDateTime::now_utc());

        tx.execute(
            "UPDATE orders SET status = $2, payment_method = $3, comment = $4, restaurant_id = $5, \
            called_at = $6, delivered_at = $7 WHERE id = $1;",
            &[
                &order.id,
                &order.status.as_str(),
                &order.payment_method.map(|method| method.as_str()),
                &order.comment,
                &order.restaurant_id,
                &order.called_at,
                &order.delivered_at,
            ],
        )
        .await
        .context("Failed to update order")?;

        let item_rows = tx
            .query(
                "SELECT product_id, quantity, price FROM order_items WHERE order_id = $1 ORDER BY id;",
                &[&order.id],
            )
            .await
            .context("Failed to retrieve order items")?;
        order.items = item_rows.iter().map(parse_row_into_order_item).collect();

        tx.commit().await.context("Failed to commit order update")?;
        Ok(Some(order))
    }

    pub async fn retrieve_place(
        &self,
        address: &str,
    ) -> anyhow::Result<Option<Place>> {
        let conn = self.get_postgres_connection().await?;
        let row = conn
            .query_opt("SELECT address, lon, lat FROM places WHERE address = $1;", &[&address])
            .await
            .context("Failed to retrieve place")?;

        Ok(row.as_ref().map(parse_row_into_place))
    }

    pub async fn retrieve_places(
        &self,
        addresses: &[String],
    ) -> anyhow::Result<Vec<Place>> {
        let conn = self.get_postgres_connection().await?;
        let rows = conn
            .query("SELECT address, lon, lat FROM places WHERE address = ANY($1);", &[&addresses])
            .await
            .context("Failed to retrieve places")?;

        Ok(rows.iter().map(parse_row_into_place).collect())
    }

    /// Last write wins, coordinates of an address do not change.
    pub async fn upsert_place(
        &self,
        address: &str,
        coordinates: Coordinates,
    ) -> anyhow::Result<()> {
        let conn = self.get_postgres_connection().await?;
        conn
            .execute(
                "INSERT INTO places (address, lon, lat) VALUES ($1, $2, $3) \
                ON CONFLICT (address) DO UPDATE SET lon = EXCLUDED.lon, lat = EXCLUDED.lat;",
                &[&address, &coordinates.lon, &coordinates.lat],
            )
            .await
            .with_context(|| format!("Failed to store place: {}", address))?;

        Ok(())
    }
}

fn parse_row_into_restaurant(
    row: &Row
) -> Restaurant {
    Restaurant {
        id: row.get("id"),
        name: row.get("name"),
        address: row.get("address"),
        contact_phone: row.get("contact_phone"),
    }
}

fn parse_row_into_product(
    row: &Row,
) -> Product {
    let category = row
        .get::<&str, Option<i32>>("category_id")
        .map(|id| ProductCategory {
            id,
            name: row.get("category_name"),
        });

    Product {
        id: row.get("id"),
        name: row.get("name"),
        category,
        price: row.get("price"),
        image: row.get("image"),
        special_status: row.get("special_status"),
        description: row.get("description"),
    }
}

fn parse_row_into_menu_entry(
    row: &Row,
) -> MenuEntry {
    MenuEntry {
        restaurant_id: row.get("restaurant_id"),
        product_id: row.get("product_id"),
        availability: row.get("availability"),
    }
}

fn parse_row_into_order(
    row: &Row,
) -> anyhow::Result<Order> {
    let payment_method = row
        .get::<&str, Option<&str>>("payment_method")
        .map(str::parse::<PaymentMethod>)
        .transpose()?;

    Ok(Order {
        id: row.get("id"),
        firstname: row.get("firstname"),
        lastname: row.get("lastname"),
        phonenumber: row.get("phonenumber"),
        address: row.get("address"),
        status: row.get::<&str, &str>("status").parse()?,
        payment_method,
        comment: row.get("comment"),
        registered_at: row.get("registered_at"),
        called_at: row.get("called_at"),
        delivered_at: row.get("delivered_at"),
        restaurant_id: row.get("restaurant_id"),
        items: Vec::new(),
    })
}

fn parse_row_into_order_item(
    row: &Row,
) -> OrderItem {
    OrderItem {
        product_id: row.get("product_id"),
        quantity: row.get("quantity"),
        price: row.get("price"),
    }
}

fn parse_row_into_place(
    row: &Row,
) -> Place {
    Place {
        address: row.get("address"),
        coordinates: Coordinates {
            lon: row.get::<&str, f64>("lon"),
            lat: row.get::<&str, f64>("lat"),
        },
    }
}
