use crate::types::window::DateWindow;

/// Parameters of a single provider call covering one [`DateWindow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderQuery {
    pub dataset_id: String,
    pub station_id: String,
    pub window: DateWindow,
    pub limit: u32,
    pub units: String,
}

impl ProviderQuery {
    /// Query-string parameters in the form expected by the NOAA CDO v2 API.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("datasetid", self.dataset_id.clone()),
            ("stationid", self.station_id.clone()),
            ("startdate", self.window.start().format("%Y-%m-%d").to_string()),
            ("enddate", self.window.end().format("%Y-%m-%d").to_string()),
            ("limit", self.limit.to_string()),
            ("units", self.units.clone()),
        ]
    }
}
