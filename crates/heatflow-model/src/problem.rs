use std::ops::Range;

/// Sources with finite supply, consumers with fixed demand, and the
/// per-unit cost of every route between them.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TransportProblem {
    /// `cost[i][j]`: per-unit cost from source `i` to consumer `j`
    pub cost: Vec<Vec<f64>>,
    /// Capacity of each source
    pub supply: Vec<f64>,
    /// Required quantity of each consumer
    pub demand: Vec<f64>,
}

impl TransportProblem {
    pub fn new(cost: Vec<Vec<f64>>, supply: Vec<f64>, demand: Vec<f64>) -> Self {
        Self { cost, supply, demand }
    }

    pub fn num_sources(&self) -> usize {
        self.supply.len()
    }

    pub fn num_consumers(&self) -> usize {
        self.demand.len()
    }

    pub fn num_routes(&self) -> usize {
        self.num_sources() * self.num_consumers()
    }

    pub fn total_supply(&self) -> f64 {
        self.supply.iter().sum()
    }

    pub fn total_demand(&self) -> f64 {
        self.demand.iter().sum()
    }

    pub fn layout(&self) -> RouteLayout {
        RouteLayout::new(self.num_sources(), self.num_consumers())
    }
}

/// Flat indexing of the `(source, consumer)` routes, row-major over
/// sources. Shared by the model builder and the solution interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteLayout {
    pub num_sources: usize,
    pub num_consumers: usize,
}

impl RouteLayout {
    pub fn new(num_sources: usize, num_consumers: usize) -> Self {
        Self {
            num_sources,
            num_consumers,
        }
    }

    pub fn num_routes(&self) -> usize {
        self.num_sources * self.num_consumers
    }

    pub fn index(&self, source: usize, consumer: usize) -> usize {
        debug_assert!(source < self.num_sources && consumer < self.num_consumers);
        source * self.num_consumers + consumer
    }

    /// Inverse of [`RouteLayout::index`].
    pub fn route(&self, index: usize) -> (usize, usize) {
        debug_assert!(index < self.num_routes());
        (index / self.num_consumers, index % self.num_consumers)
    }

    /// Routes leaving `source`; contiguous in the flat order.
    pub fn source_routes(&self, source: usize) -> Range<usize> {
        let start = source * self.num_consumers;
        start..start + self.num_consumers
    }

    /// Routes arriving at `consumer`; strided by the consumer count.
    pub fn consumer_routes(&self, consumer: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.num_sources).map(move |source| self.index(source, consumer))
    }
}
