//! Compilation of [`ShipmentFilter`] expressions to parameterised SQL.
//!
//! Column names come from the closed [`ShipmentField`] set; every value is a
//! bind parameter.

use order_tracker_core::{ShipmentField, ShipmentFilter};
use sqlx::{Postgres, QueryBuilder};

/// `SELECT {columns} FROM order_shipment WHERE {filter} ORDER BY number`
pub(crate) fn shipment_query(
    columns: &str,
    filter: &ShipmentFilter,
) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(format!("SELECT {columns} FROM order_shipment WHERE "));
    push_filter(&mut query, filter);
    query.push(" ORDER BY number");
    query
}

fn push_filter(query: &mut QueryBuilder<'static, Postgres>, filter: &ShipmentFilter) {
    match filter {
        ShipmentFilter::And(filters) => push_junction(query, filters, " AND ", "TRUE"),
        ShipmentFilter::Or(filters) => push_junction(query, filters, " OR ", "FALSE"),
        ShipmentFilter::Not(inner) => {
            query.push("NOT (");
            push_filter(query, inner);
            query.push(")");
        }
        ShipmentFilter::Eq { field, value } => {
            query.push(field.column());
            // Dates compare in their ISO text form, like the in-memory filter.
            if *field == ShipmentField::LastUpdate {
                query.push("::text");
            }
            query.push(" = ").push_bind(value.clone());
        }
    }
}

fn push_junction(
    query: &mut QueryBuilder<'static, Postgres>,
    filters: &[ShipmentFilter],
    separator: &str,
    empty: &str,
) {
    if filters.is_empty() {
        query.push(empty);
        return;
    }

    query.push("(");
    for (i, filter) in filters.iter().enumerate() {
        if i > 0 {
            query.push(separator);
        }
        push_filter(query, filter);
    }
    query.push(")");
}
