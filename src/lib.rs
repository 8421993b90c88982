use datasource::DataSources;
use lazy_static::lazy_static;

pub mod cancel;
pub mod datasource;
pub mod error;
pub mod escalation;
pub mod id_mapper;
pub mod pathway;
pub mod presenter;
pub mod resolver;
pub mod rhea;
pub mod search;

lazy_static! {
    // Known annotation datasources
    pub static ref DATA_SOURCES: DataSources = DataSources::default();
}
