use std::sync::Arc;

use tokio::sync::watch;

use crate::filter::{FilterCriteria, FilterResult, FilterUpdate, FilteredView};
use crate::refresh::RefreshState;

/// Everything a front-end needs: the published refresh state plus the user's filter selection
pub struct AppState {
    refresh: watch::Receiver<RefreshState>,
    criteria: FilterCriteria,
    view: FilteredView,
}

impl AppState {
    pub fn new(refresh: watch::Receiver<RefreshState>, criteria: FilterCriteria) -> Self {
        Self {
            refresh,
            criteria,
            view: FilteredView::default(),
        }
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn set_filter_criteria(&mut self, update: FilterUpdate) {
        self.criteria.update(update);
        tracing::debug!(criteria = ?self.criteria, "Filter criteria changed");
    }

    pub fn snapshot(&self) -> RefreshState {
        self.refresh.borrow().clone()
    }

    /// Vehicles passing the current filters, recomputed only when the snapshot or criteria changed
    pub fn visible(&mut self) -> Arc<FilterResult> {
        let (generation, vehicles) = {
            let state = self.refresh.borrow();
            (state.generation, Arc::clone(&state.vehicles))
        };
        self.view.get(generation, &vehicles, &self.criteria)
    }

    /// Wait for the next published state. Returns false once no further updates will arrive.
    pub async fn changed(&mut self) -> bool {
        self.refresh.changed().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::RouteReference;
    use crate::filter::TypeFilter;
    use crate::models::{RawVehicleRecord, VehicleFeed, VehicleKind};

    fn feed(routes: &[&str]) -> VehicleFeed {
        VehicleFeed {
            last_update: Some("12:00:00".to_string()),
            vehicles: routes
                .iter()
                .enumerate()
                .map(|(i, route)| RawVehicleRecord {
                    vehicle_id: i as i64,
                    route_short_name: route.to_string(),
                    headsign: String::new(),
                    vehicle_code: String::new(),
                    speed: 0.0,
                    lat: 0.0,
                    lon: 0.0,
                    bearing: 0.0,
                    delay_seconds: 0,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_visible_follows_snapshot_and_criteria() {
        let reference: RouteReference = [("3".to_string(), VehicleKind::Tram)].into_iter().collect();
        let (tx, rx) = watch::channel(RefreshState::default());
        let mut app = AppState::new(rx, FilterCriteria::default());

        assert!(app.visible().vehicles.is_empty());

        tx.send_modify(|s| s.apply_success(feed(&["3", "3", "122"]), &reference));
        assert!(app.changed().await);
        let all = app.visible();
        assert_eq!((all.bus_count, all.tram_count), (1, 2));

        app.set_filter_criteria(FilterUpdate { kind: Some(TypeFilter::Bus), ..Default::default() });
        let buses = app.visible();
        assert_eq!(buses.vehicles.len(), 1);
        assert_eq!(buses.vehicles[0].record.route_short_name, "122");

        app.set_filter_criteria(FilterUpdate { lines: Some("3".to_string()), ..Default::default() });
        assert!(app.visible().vehicles.is_empty());

        drop(tx);
        assert!(!app.changed().await);
        assert_eq!(app.snapshot().last_update.as_deref(), Some("12:00:00"));
    }
}
