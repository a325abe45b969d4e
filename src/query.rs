use rusqlite::types::Value;
use serde::de::{self, Deserializer};
use serde::Deserialize;

pub(crate) const RESTAURANT_COLUMNS: &str =
    "id, name, category, city, price, num_ratings, sum_rating, avg_rating, photo, timestamp";

// Sort orders recognized by the restaurant list. Anything else on the wire
// is rejected during deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Rating,
    Review,
}

impl<'de> Deserialize<'de> for SortBy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            "Rating" => Ok(SortBy::Rating),
            "Review" => Ok(SortBy::Review),
            other => Err(de::Error::unknown_variant(other, &["Rating", "Review"])),
        }
    }
}

// Filter specification for the restaurant list. All fields are optional;
// absent fields add no predicate.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RestaurantFilter {
    pub category: Option<String>,
    pub city: Option<String>,
    pub price: Option<u8>,
    pub sort: Option<SortBy>,
}

// A single equality predicate on a restaurant column.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: &'static str,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: &'static str,
    pub descending: bool,
}

// A query over the restaurants table. Plain value: built up by
// `apply_query_filters` and rendered to SQL once, it never touches the
// database itself.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RestaurantQuery {
    pub predicates: Vec<Predicate>,
    pub order: Option<OrderBy>,
}

impl RestaurantQuery {
    pub fn new() -> Self {
        Self::default()
    }

    // Renders the query as parameterized SQL plus its parameter list.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut sql = format!("SELECT {} FROM restaurants", RESTAURANT_COLUMNS);
        let mut params = Vec::with_capacity(self.predicates.len());
        for (i, predicate) in self.predicates.iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            sql.push_str(&format!("{} = ?{}", predicate.field, i + 1));
            params.push(predicate.value.clone());
        }
        if let Some(order) = &self.order {
            sql.push_str(&format!(
                " ORDER BY {} {}",
                order.field,
                if order.descending { "DESC" } else { "ASC" }
            ));
        }
        (sql, params)
    }
}

// Refines a base query with a filter specification: one equality predicate
// per present field, and exactly one ordering clause chosen by `sort`.
pub fn apply_query_filters(mut q: RestaurantQuery, filter: &RestaurantFilter) -> RestaurantQuery {
    if let Some(category) = &filter.category {
        q.predicates.push(Predicate {
            field: "category",
            value: Value::Text(category.clone()),
        });
    }
    if let Some(city) = &filter.city {
        q.predicates.push(Predicate {
            field: "city",
            value: Value::Text(city.clone()),
        });
    }
    if let Some(price) = filter.price {
        q.predicates.push(Predicate {
            field: "price",
            value: Value::Integer(i64::from(price)),
        });
    }
    q.order = Some(match filter.sort {
        Some(SortBy::Review) => OrderBy {
            field: "num_ratings",
            descending: true,
        },
        Some(SortBy::Rating) | None => OrderBy {
            field: "avg_rating",
            descending: true,
        },
    });
    q
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_only_filter_adds_exactly_one_predicate() {
        let filter = RestaurantFilter {
            category: Some("Pizza".into()),
            ..Default::default()
        };
        let q = apply_query_filters(RestaurantQuery::new(), &filter);

        assert_eq!(
            q.predicates,
            vec![Predicate {
                field: "category",
                value: Value::Text("Pizza".into()),
            }]
        );
    }

    #[test]
    fn every_filter_produces_exactly_one_ordering_clause() {
        let filters = [
            RestaurantFilter::default(),
            RestaurantFilter {
                sort: Some(SortBy::Rating),
                ..Default::default()
            },
            RestaurantFilter {
                sort: Some(SortBy::Review),
                ..Default::default()
            },
            RestaurantFilter {
                category: Some("Sushi".into()),
                city: Some("Nairobi".into()),
                price: Some(3),
                sort: None,
            },
        ];
        for filter in &filters {
            let q = apply_query_filters(RestaurantQuery::new(), filter);
            assert!(q.order.is_some());
            let (sql, _) = q.to_sql();
            assert_eq!(sql.matches("ORDER BY").count(), 1);
        }
    }

    #[test]
    fn sort_absent_and_rating_order_by_average_rating() {
        for sort in [None, Some(SortBy::Rating)] {
            let filter = RestaurantFilter {
                sort,
                ..Default::default()
            };
            let q = apply_query_filters(RestaurantQuery::new(), &filter);
            assert_eq!(
                q.order,
                Some(OrderBy {
                    field: "avg_rating",
                    descending: true,
                })
            );
        }
    }

    #[test]
    fn sort_review_orders_by_rating_count() {
        let filter = RestaurantFilter {
            sort: Some(SortBy::Review),
            ..Default::default()
        };
        let q = apply_query_filters(RestaurantQuery::new(), &filter);
        assert_eq!(
            q.order,
            Some(OrderBy {
                field: "num_ratings",
                descending: true,
            })
        );
    }

    #[test]
    fn builder_is_reinvocable_against_the_same_base() {
        let base = RestaurantQuery::new();

        let by_city = apply_query_filters(
            base.clone(),
            &RestaurantFilter {
                city: Some("Mombasa".into()),
                ..Default::default()
            },
        );
        let by_price = apply_query_filters(
            base.clone(),
            &RestaurantFilter {
                price: Some(2),
                ..Default::default()
            },
        );

        assert_eq!(base, RestaurantQuery::new());
        assert_eq!(by_city.predicates.len(), 1);
        assert_eq!(by_city.predicates[0].field, "city");
        assert_eq!(by_price.predicates.len(), 1);
        assert_eq!(
            by_price.predicates[0].value,
            Value::Integer(2),
        );
    }

    #[test]
    fn full_filter_renders_parameterized_sql() {
        let filter = RestaurantFilter {
            category: Some("Ramen".into()),
            city: Some("Kisumu".into()),
            price: Some(1),
            sort: Some(SortBy::Review),
        };
        let (sql, params) = apply_query_filters(RestaurantQuery::new(), &filter).to_sql();

        assert!(sql.contains("WHERE category = ?1 AND city = ?2 AND price = ?3"));
        assert!(sql.ends_with("ORDER BY num_ratings DESC"));
        assert_eq!(
            params,
            vec![
                Value::Text("Ramen".into()),
                Value::Text("Kisumu".into()),
                Value::Integer(1),
            ]
        );
    }

    #[test]
    fn unknown_sort_values_are_rejected_on_the_wire() {
        let err = serde_json::from_str::<RestaurantFilter>(r#"{"sort":"Price"}"#);
        assert!(err.is_err());
    }
}
