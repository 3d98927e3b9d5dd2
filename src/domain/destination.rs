use serde::Serialize;

use crate::i18n::{Locale, MessageKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeliveryWindow {
    FourHours,
    TwentyFourHours,
}

impl DeliveryWindow {
    pub fn message_key(self) -> MessageKey {
        match self {
            DeliveryWindow::FourHours => MessageKey::DeliveryFourHours,
            DeliveryWindow::TwentyFourHours => MessageKey::DeliveryTwentyFourHours,
        }
    }

    pub fn describe(self, locale: Locale) -> String {
        crate::i18n::translate(locale, self.message_key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    pub name: &'static str,
    pub delivery: DeliveryWindow,
}

const fn province(name: &'static str, delivery: DeliveryWindow) -> Destination {
    Destination { name, delivery }
}

pub const DESTINATIONS: &[Destination] = &[
    province("La Habana", DeliveryWindow::FourHours),
    province("Artemisa", DeliveryWindow::TwentyFourHours),
    province("Pinar del Río", DeliveryWindow::TwentyFourHours),
    province("Mayabeque", DeliveryWindow::TwentyFourHours),
    province("Matanzas", DeliveryWindow::TwentyFourHours),
    province("Cienfuegos", DeliveryWindow::TwentyFourHours),
    province("Villa Clara", DeliveryWindow::TwentyFourHours),
    province("Sancti Spíritus", DeliveryWindow::TwentyFourHours),
    province("Ciego de Ávila", DeliveryWindow::TwentyFourHours),
    province("Camagüey", DeliveryWindow::TwentyFourHours),
    province("Las Tunas", DeliveryWindow::TwentyFourHours),
    province("Holguín", DeliveryWindow::TwentyFourHours),
    province("Granma", DeliveryWindow::TwentyFourHours),
    province("Santiago de Cuba", DeliveryWindow::TwentyFourHours),
    province("Guantánamo", DeliveryWindow::TwentyFourHours),
];

pub fn find_destination(name: &str) -> Option<&'static Destination> {
    let name = name.trim();
    DESTINATIONS.iter().find(|d| d.name == name)
}
