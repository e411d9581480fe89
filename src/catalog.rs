//! Entity catalog
//!
//! Pairs each entity's validation [`RuleSet`] with the [`TableConfig`] of the
//! warehouse table it loads into, plus the registry of derived functions
//! those tables use. [`Catalog::ecommerce`] provides the built-in customers,
//! products, orders, order items and inventory entities.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::loader::{DerivedRegistry, TableConfig, TableDefinition};
use crate::validation::{
    BusinessRule, ColumnType, CompareOp, Operand, OutlierMethod, RuleSet, Severity, Validator,
    ValidatorSettings,
};

/// Validation rules and target table for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    pub rules: RuleSet,
    pub table: TableConfig,
}

impl EntityConfig {
    pub fn new(rules: RuleSet, table: TableConfig) -> Self {
        Self { rules, table }
    }

    pub fn name(&self) -> &str {
        &self.rules.entity
    }
}

/// All entities a pipeline knows about
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entities: BTreeMap<String, EntityConfig>,
    registry: DerivedRegistry,
}

impl Catalog {
    /// Empty catalog using the given derived-function registry
    pub fn new(registry: DerivedRegistry) -> Self {
        Self {
            entities: BTreeMap::new(),
            registry,
        }
    }

    /// Built-in e-commerce entities with the built-in derived functions
    pub fn ecommerce() -> Self {
        let mut catalog = Self::new(DerivedRegistry::builtin());
        for entity in [customers(), products(), orders(), order_items(), inventory()] {
            catalog.insert(entity);
        }
        catalog
    }

    /// Add or replace an entity
    pub fn insert(&mut self, entity: EntityConfig) {
        self.entities.insert(entity.name().to_string(), entity);
    }

    pub fn with_entities(mut self, entities: impl IntoIterator<Item = EntityConfig>) -> Self {
        for entity in entities {
            self.insert(entity);
        }
        self
    }

    pub fn registry(&self) -> &DerivedRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut DerivedRegistry {
        &mut self.registry
    }

    pub fn entity(&self, name: &str) -> Option<&EntityConfig> {
        self.entities.get(name)
    }

    /// Entity names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityConfig> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Resolved table definition for an entity
    pub fn table_definition(&self, entity: &str) -> Result<TableDefinition, ConfigError> {
        let config = self
            .entity(entity)
            .ok_or_else(|| ConfigError::invalid_entity(entity, "not in catalog"))?;
        config
            .table
            .resolve(&self.registry)
            .map_err(|e| ConfigError::invalid_entity(entity, e))
    }

    /// Validator with every entity's rule set registered
    pub fn validator(&self, settings: ValidatorSettings) -> Result<Validator, ConfigError> {
        let mut validator = Validator::new(settings);
        for (name, config) in &self.entities {
            validator
                .register(config.rules.clone())
                .map_err(|e| ConfigError::invalid_entity(name, e))?;
        }
        Ok(validator)
    }

    /// Check every entity: rules, table definition and references
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, config) in &self.entities {
            config
                .rules
                .validate()
                .map_err(|e| ConfigError::invalid_entity(name, e))?;
            self.table_definition(name)?;
            for reference in &config.rules.references {
                if !self.entities.contains_key(&reference.entity) {
                    return Err(ConfigError::invalid_entity(
                        name,
                        format!(
                            "column '{}' references unknown entity '{}'",
                            reference.column, reference.entity
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn non_negative(id: &str, column: &str) -> BusinessRule {
    BusinessRule::compare(id, column, CompareOp::Ge, Operand::Literal(0.0))
}

fn positive(id: &str, column: &str) -> BusinessRule {
    BusinessRule::compare(id, column, CompareOp::Gt, Operand::Literal(0.0))
}

fn customers() -> EntityConfig {
    let rules = RuleSet::new("customers", &["customer_id"])
        .required("customer_id", ColumnType::Integer)
        .required("first_name", ColumnType::Text)
        .required("last_name", ColumnType::Text)
        .required("email", ColumnType::Email)
        .optional("phone", ColumnType::Phone)
        .optional("registration_date", ColumnType::Timestamp)
        .optional("last_login", ColumnType::Timestamp)
        .unique("email");
    let table = TableConfig::new("dim_customers", &["customer_id"]).derive("full_name", "full_name");
    EntityConfig::new(rules, table)
}

fn products() -> EntityConfig {
    let rules = RuleSet::new("products", &["product_id"])
        .required("product_id", ColumnType::Integer)
        .required("product_name", ColumnType::Text)
        .required("price", ColumnType::Number)
        .optional("cost", ColumnType::Number)
        .optional("weight", ColumnType::Number)
        .optional("created_date", ColumnType::Timestamp)
        .optional("updated_date", ColumnType::Timestamp)
        .rule(positive("price_positive", "price"))
        .rule(non_negative("cost_non_negative", "cost"))
        .rule(
            BusinessRule::compare(
                "cost_within_price",
                "cost",
                CompareOp::Le,
                Operand::Column("price".to_string()),
            )
            .with_severity(Severity::Warning),
        )
        .outlier("price", OutlierMethod::iqr());
    let table = TableConfig::new("dim_products", &["product_id"])
        .derive("profit_margin", "profit_margin");
    EntityConfig::new(rules, table)
}

fn orders() -> EntityConfig {
    let rules = RuleSet::new("orders", &["order_id"])
        .required("order_id", ColumnType::Integer)
        .required("customer_id", ColumnType::Integer)
        .required("order_date", ColumnType::Timestamp)
        .required("order_total", ColumnType::Number)
        .optional("tax_amount", ColumnType::Number)
        .optional("shipping_cost", ColumnType::Number)
        .rule(positive("order_total_positive", "order_total"))
        .rule(BusinessRule::compare(
            "order_date_not_future",
            "order_date",
            CompareOp::Le,
            Operand::Now,
        ))
        .reference("customer_id", "customers")
        .outlier("order_total", OutlierMethod::iqr());
    let table = TableConfig::new("fact_orders", &["order_id"]).derive("net_amount", "net_amount");
    EntityConfig::new(rules, table)
}

fn order_items() -> EntityConfig {
    let rules = RuleSet::new("order_items", &["order_item_id"])
        .required("order_item_id", ColumnType::Integer)
        .required("order_id", ColumnType::Integer)
        .required("product_id", ColumnType::Integer)
        .required("quantity", ColumnType::Integer)
        .required("unit_price", ColumnType::Number)
        .optional("total_price", ColumnType::Number)
        .optional("discount_applied", ColumnType::Number)
        .rule(positive("quantity_positive", "quantity"))
        .rule(positive("unit_price_positive", "unit_price"))
        .reference("order_id", "orders")
        .reference("product_id", "products");
    let table = TableConfig::new("fact_order_items", &["order_item_id"])
        .derive("line_total", "line_total")
        .derive("discount_percentage", "discount_percentage");
    EntityConfig::new(rules, table)
}

fn inventory() -> EntityConfig {
    let rules = RuleSet::new("inventory", &["inventory_id"])
        .required("inventory_id", ColumnType::Integer)
        .required("product_id", ColumnType::Integer)
        .required("quantity_on_hand", ColumnType::Integer)
        .optional("quantity_reserved", ColumnType::Integer)
        .optional("reorder_level", ColumnType::Integer)
        .optional("last_updated", ColumnType::Timestamp)
        .rule(non_negative("quantity_on_hand_non_negative", "quantity_on_hand"))
        .rule(non_negative("quantity_reserved_non_negative", "quantity_reserved"))
        .reference("product_id", "products");
    let table = TableConfig::new("fact_inventory", &["inventory_id"])
        .derive("available_quantity", "available_quantity")
        .derive("stock_status", "stock_status");
    EntityConfig::new(rules, table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{Severity, Reference};

    #[test]
    fn test_ecommerce_catalog_is_valid() {
        let catalog = Catalog::ecommerce();
        assert_eq!(
            catalog.names().collect::<Vec<_>>(),
            vec!["customers", "inventory", "order_items", "orders", "products"]
        );
        catalog.validate().unwrap();

        let definition = catalog.table_definition("inventory").unwrap();
        assert_eq!(definition.name(), "fact_inventory");
        assert_eq!(definition.derived().len(), 2);
        assert!(catalog.validator(ValidatorSettings::default()).is_ok());
    }

    #[test]
    fn test_unknown_reference_rejected() {
        let mut catalog = Catalog::ecommerce();
        let mut returns = EntityConfig::new(
            RuleSet::new("returns", &["return_id"]),
            TableConfig::new("fact_returns", &["return_id"]),
        );
        returns.rules.references.push(Reference {
            column: "shipment_id".to_string(),
            entity: "shipments".to_string(),
            severity: Severity::Error,
        });
        catalog.insert(returns);
        let err = catalog.validate().unwrap_err();
        assert!(err.to_string().contains("shipments"));
    }

    #[test]
    fn test_unknown_derived_function_rejected() {
        let catalog = Catalog::ecommerce().with_entities([EntityConfig::new(
            RuleSet::new("returns", &["return_id"]),
            TableConfig::new("fact_returns", &["return_id"]).derive("refund", "refund_amount"),
        )]);
        assert!(catalog.validate().is_err());
        assert!(catalog.table_definition("returns").is_err());
    }
}
