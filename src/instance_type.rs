//! Instance types and the pricing data source consulted by planners.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::error::ConsolidationError;

/// Shape and hourly price of a node that can be provisioned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstanceType {
    pub name: String,
    pub cpu: f32,
    /// Memory capacity in GB.
    pub memory: f64,
    /// Hourly price.
    pub price: f64,
}

impl InstanceType {
    pub fn new(name: &str, cpu: f32, memory: f64, price: f64) -> Self {
        Self {
            name: name.to_string(),
            cpu,
            memory,
            price,
        }
    }

    pub fn fits(&self, cpu: f32, memory: f64) -> bool {
        self.cpu >= cpu && self.memory >= memory
    }
}

pub trait PricingProvider: Send + Sync {
    /// Hourly price of the instance type.
    fn price(&self, instance_type: &str) -> Result<f64, ConsolidationError>;

    /// Instance types that can be launched as replacements.
    fn instance_types(&self) -> Result<Vec<InstanceType>, ConsolidationError>;

    /// The cheapest launchable instance type able to hold the given requests.
    fn cheapest_fitting(&self, cpu: f32, memory: f64) -> Result<Option<InstanceType>, ConsolidationError> {
        let mut cheapest: Option<InstanceType> = None;
        for instance_type in self.instance_types()? {
            if !instance_type.fits(cpu, memory) {
                continue;
            }
            if cheapest.as_ref().map_or(true, |best| instance_type.price < best.price) {
                cheapest = Some(instance_type);
            }
        }
        Ok(cheapest)
    }
}

/// Static instance type catalog loaded from the simulation config.
#[derive(Clone, Debug, Default)]
pub struct InstanceTypeCatalog {
    instance_types: BTreeMap<String, InstanceType>,
}

impl InstanceTypeCatalog {
    pub fn new(instance_types: Vec<InstanceType>) -> Self {
        Self {
            instance_types: instance_types.into_iter().map(|it| (it.name.clone(), it)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Result<&InstanceType, ConsolidationError> {
        self.instance_types.get(name).ok_or_else(|| ConsolidationError::Pricing {
            instance_type: name.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.instance_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instance_types.is_empty()
    }
}

impl PricingProvider for InstanceTypeCatalog {
    fn price(&self, instance_type: &str) -> Result<f64, ConsolidationError> {
        self.get(instance_type).map(|it| it.price)
    }

    fn instance_types(&self) -> Result<Vec<InstanceType>, ConsolidationError> {
        Ok(self.instance_types.values().cloned().collect())
    }
}
