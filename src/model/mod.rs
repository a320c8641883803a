//! Ensemble classifier
//!
//! ```rust,no_run
//! use trueno_train::dataset::Dataset;
//! use trueno_train::model::{ForestParams, RandomForest};
//!
//! let data = Dataset::load("data/iris.csv", "target")?;
//! let forest = RandomForest::fit(ForestParams::new(100, 42), &data)?;
//! let predicted = forest.predict(data.features())?;
//! # Ok::<(), trueno_train::Error>(())
//! ```

mod forest;

pub use forest::{ForestParams, RandomForest};
