use gatepass_shared::{Event, Location, Organizer, Section};
use serde::Serialize;

/// An event joined with its reference data
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EventDetail {
    pub event: Event,
    pub organizer: Option<Organizer>,
    pub location: Option<Location>,
    pub section: Option<Section>,
}

impl EventDetail {
    pub fn venue_label(&self) -> String {
        match (&self.location, &self.section) {
            (Some(location), Some(section)) => match &location.city {
                Some(city) => format!("{}, {} ({})", location.name, city, section.name),
                None => format!("{} ({})", location.name, section.name),
            },
            (Some(location), None) => match &location.city {
                Some(city) => format!("{}, {}", location.name, city),
                None => location.name.clone(),
            },
            (None, Some(section)) => section.name.clone(),
            (None, None) => "Venue to be announced".to_string(),
        }
    }

    pub fn seats_label(&self) -> String {
        if self.event.is_sold_out() {
            "Sold out".to_string()
        } else {
            format!("{} of {} seats left", self.event.remaining_seats, self.event.total_seats)
        }
    }
}
