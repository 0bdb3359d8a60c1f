use gatepass_core::{BackendError, StorefrontBackend};
use gatepass_shared::{Event, EventQuery, Location, Organizer, Section};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::detail::EventDetail;
use crate::query::validate_query;
use crate::CatalogResult;

#[derive(Debug, Default)]
struct ReferenceData {
    locations: HashMap<i64, Location>,
    sections: HashMap<i64, Section>,
}

/// Event discovery on top of the backend listings
pub struct EventCatalog {
    backend: Arc<dyn StorefrontBackend>,
    reference: OnceCell<ReferenceData>,
}

impl EventCatalog {
    pub fn new(backend: Arc<dyn StorefrontBackend>) -> Self {
        Self {
            backend,
            reference: OnceCell::new(),
        }
    }

    pub async fn search(&self, keyword: &str) -> CatalogResult<Vec<Event>> {
        let query = EventQuery::keyword(keyword.trim());
        validate_query(&query)?;
        let events = self.backend.search_events(&query).await?;
        info!("Search for {:?} returned {} events", keyword, events.len());
        Ok(events)
    }

    pub async fn filter(&self, query: &EventQuery) -> CatalogResult<Vec<Event>> {
        validate_query(query)?;
        Ok(self.backend.filter_events(query).await?)
    }

    pub async fn past(&self, query: &EventQuery) -> CatalogResult<Vec<Event>> {
        validate_query(query)?;
        Ok(self.backend.past_events(query).await?)
    }

    pub async fn event(&self, event_id: i64) -> CatalogResult<Event> {
        Ok(self.backend.get_event(event_id).await?)
    }

    pub async fn locations(&self) -> CatalogResult<Vec<Location>> {
        let mut locations: Vec<Location> = self.reference().await?.locations.values().cloned().collect();
        locations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(locations)
    }

    pub async fn sections(&self) -> CatalogResult<Vec<Section>> {
        let mut sections: Vec<Section> = self.reference().await?.sections.values().cloned().collect();
        sections.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sections)
    }

    pub async fn organizer(&self, organizer_id: i64) -> CatalogResult<Organizer> {
        Ok(self.backend.get_organizer(organizer_id).await?)
    }

    /// Event plus organizer, location and section.
    /// Missing reference rows are left empty instead of failing the detail.
    pub async fn detail(&self, event_id: i64) -> CatalogResult<EventDetail> {
        let event = self.backend.get_event(event_id).await?;

        let organizer = match event.organizer_id {
            Some(id) => match self.backend.get_organizer(id).await {
                Ok(organizer) => Some(organizer),
                Err(BackendError::NotFound(_)) => {
                    warn!("Organizer {} of event {} not found", id, event.id);
                    None
                }
                Err(e) => return Err(e.into()),
            },
            None => None,
        };

        let reference = self.reference().await?;
        let location = event.location_id.and_then(|id| reference.locations.get(&id).cloned());
        let section = event.section_id.and_then(|id| reference.sections.get(&id).cloned());

        Ok(EventDetail {
            event,
            organizer,
            location,
            section,
        })
    }

    async fn reference(&self) -> CatalogResult<&ReferenceData> {
        let data = self
            .reference
            .get_or_try_init(|| async {
                let locations = self.backend.list_locations().await?;
                let sections = self.backend.list_sections().await?;
                info!("Loaded {} locations and {} sections", locations.len(), sections.len());
                Ok::<_, BackendError>(ReferenceData {
                    locations: locations.into_iter().map(|l| (l.id, l)).collect(),
                    sections: sections.into_iter().map(|s| (s.id, s)).collect(),
                })
            })
            .await?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use gatepass_core::MockBackend;

    fn event(id: i64, name: &str, ended: bool) -> Event {
        let start = if ended { Utc::now() - Duration::days(10) } else { Utc::now() + Duration::days(10) };
        Event {
            id,
            name: name.to_string(),
            description: None,
            category: Some("music".to_string()),
            price: 75_000,
            total_seats: 50,
            remaining_seats: 0,
            start_date: start,
            end_date: start + Duration::days(1),
            location_id: Some(1),
            organizer_id: Some(9),
            section_id: Some(2),
            image_url: None,
        }
    }

    fn backend() -> Arc<MockBackend> {
        Arc::new(
            MockBackend::new()
                .with_event(event(1, "Jazz Night", false))
                .with_event(event(2, "Jazz Brunch", true))
                .with_event(event(3, "Rock Fest", false))
                .with_reference_data(
                    vec![Organizer { id: 9, name: "Sound Co".to_string(), description: None }],
                    vec![Location { id: 1, name: "Taman Ismail Marzuki".to_string(), city: Some("Jakarta".to_string()) }],
                    vec![Section { id: 2, name: "Festival".to_string() }],
                ),
        )
    }

    #[tokio::test]
    async fn test_search_and_past_split() {
        let catalog = EventCatalog::new(backend());

        let upcoming = catalog.search("jazz").await.unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].id, 1);

        let past = catalog.past(&EventQuery::keyword("jazz")).await.unwrap();
        assert_eq!(past.len(), 1);
        assert_eq!(past[0].id, 2);
    }

    #[tokio::test]
    async fn test_detail_joins_reference_data_once() {
        let backend = backend();
        let catalog = EventCatalog::new(backend.clone());

        let detail = catalog.detail(1).await.unwrap();
        assert_eq!(detail.venue_label(), "Taman Ismail Marzuki, Jakarta (Festival)");
        assert_eq!(detail.seats_label(), "Sold out");
        assert_eq!(detail.organizer.unwrap().name, "Sound Co");

        catalog.detail(3).await.unwrap();
        assert_eq!(backend.calls("list_locations"), 1);
        assert_eq!(backend.calls("list_sections"), 1);
    }

    #[tokio::test]
    async fn test_invalid_query_is_not_sent() {
        let backend = backend();
        let catalog = EventCatalog::new(backend.clone());

        let query = EventQuery { limit: Some(0), ..Default::default() };
        assert!(catalog.filter(&query).await.is_err());
        assert_eq!(backend.calls("filter_events"), 0);
    }
}
