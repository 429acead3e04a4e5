//! WMO weather code lookup.
//! See: https://open-meteo.com/en/docs#weathervariables

use serde::Serialize;

/// Display descriptor attached to every daily record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeatherDescriptor {
    pub emoji: &'static str,
    pub description: &'static str,
    pub reference_color: &'static str,
}

const fn descriptor(
    emoji: &'static str,
    description: &'static str,
    reference_color: &'static str,
) -> WeatherDescriptor {
    WeatherDescriptor { emoji, description, reference_color }
}

pub const UNKNOWN: WeatherDescriptor = descriptor("🌡️", "Unknown", "#808080");

/// Map a weather code to its descriptor. Unmapped codes yield [`UNKNOWN`].
pub fn resolve(code: i32) -> WeatherDescriptor {
    match code {
        0 => descriptor("☀️", "Clear Sky", "#FFD700"),
        1 => descriptor("🌤️", "Mainly Clear", "#87CEEB"),
        2 => descriptor("⛅", "Partly Cloudy", "#87CEEB"),
        3 => descriptor("☁️", "Overcast", "#808080"),
        45 => descriptor("🌫️", "Foggy", "#B0C4DE"),
        48 => descriptor("🌫️", "Icy Fog", "#B0C4DE"),
        51 => descriptor("🌦️", "Light Drizzle", "#4682B4"),
        53 => descriptor("🌦️", "Drizzle", "#4682B4"),
        55 => descriptor("🌧️", "Heavy Drizzle", "#4169E1"),
        61 => descriptor("🌧️", "Light Rain", "#4169E1"),
        63 => descriptor("🌧️", "Rain", "#0000CD"),
        65 => descriptor("🌧️", "Heavy Rain", "#00008B"),
        71 => descriptor("🌨️", "Light Snow", "#E0FFFF"),
        73 => descriptor("🌨️", "Snow", "#E0FFFF"),
        75 => descriptor("❄️", "Heavy Snow", "#B0E0E6"),
        77 => descriptor("🌨️", "Snow Grains", "#E0FFFF"),
        80 => descriptor("🌦️", "Light Showers", "#4682B4"),
        81 => descriptor("🌧️", "Rain Showers", "#4169E1"),
        82 => descriptor("⛈️", "Heavy Showers", "#00008B"),
        85 => descriptor("🌨️", "Snow Showers", "#E0FFFF"),
        86 => descriptor("❄️", "Heavy Snow Showers", "#B0E0E6"),
        95 => descriptor("⛈️", "Thunderstorm", "#2F4F4F"),
        96 => descriptor("⛈️", "Thunderstorm with Hail", "#1C1C1C"),
        99 => descriptor("⛈️", "Heavy Thunderstorm", "#000000"),
        _ => UNKNOWN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_sky() {
        let d = resolve(0);
        assert_eq!(d.description, "Clear Sky");
        assert_eq!(d.emoji, "☀️");
    }

    #[test]
    fn unknown_codes_fall_back() {
        assert_eq!(resolve(9999), UNKNOWN);
        assert_eq!(resolve(-1), UNKNOWN);
        assert_eq!(resolve(4), UNKNOWN);
    }

    #[test]
    fn thunderstorm_family() {
        assert_eq!(resolve(95).description, "Thunderstorm");
        assert_eq!(resolve(96).description, "Thunderstorm with Hail");
        assert_eq!(resolve(99).reference_color, "#000000");
    }
}
