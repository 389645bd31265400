//! Per-service log prefixes and their color assignment.

use std::collections::HashMap;

/// Cycle for regular services.
const SERVICE_COLORS: [u8; 5] = [32, 33, 34, 35, 36];

/// Disjoint bright cycle for system channels (ids starting with '$'), walked
/// in reverse so the first system channel never shares a hue with the first
/// service.
const SYSTEM_COLORS: [u8; 5] = [96, 95, 94, 93, 92];

/// Assigns a stable SGR color code per source id, first come first served.
#[derive(Debug, Default)]
pub struct PrefixColors {
    assigned: HashMap<String, u8>,
    next_service: usize,
    next_system: usize,
}

impl PrefixColors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color_for(&mut self, source_id: &str) -> u8 {
        if let Some(&color) = self.assigned.get(source_id) {
            return color;
        }

        let color = if source_id.starts_with('$') {
            let color = SYSTEM_COLORS[self.next_system % SYSTEM_COLORS.len()];
            self.next_system += 1;
            color
        } else {
            let color = SERVICE_COLORS[self.next_service % SERVICE_COLORS.len()];
            self.next_service += 1;
            color
        };
        self.assigned.insert(source_id.to_string(), color);
        color
    }

    /// The `name: ` prefix prepended to every wrapped segment of a source's
    /// log lines when more than one source is shown.
    pub fn prefix_for(&mut self, source_id: &str, name: &str) -> String {
        let color = self.color_for(source_id);
        format!("\x1b[{color}m{name}\x1b[39m: ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_are_assigned_first_seen_and_memoized() {
        let mut colors = PrefixColors::new();
        assert_eq!(colors.color_for("web"), 32);
        assert_eq!(colors.color_for("api"), 33);
        assert_eq!(colors.color_for("web"), 32);
    }

    #[test]
    fn palette_wraps_around() {
        let mut colors = PrefixColors::new();
        for id in ["a", "b", "c", "d", "e"] {
            colors.color_for(id);
        }
        assert_eq!(colors.color_for("f"), 32);
    }

    #[test]
    fn system_channels_use_the_bright_palette() {
        let mut colors = PrefixColors::new();
        assert_eq!(colors.color_for("web"), 32);
        assert_eq!(colors.color_for("$localdev"), 96);
        assert_eq!(colors.color_for("$other"), 95);
    }

    #[test]
    fn prefix_closes_its_color() {
        let mut colors = PrefixColors::new();
        assert_eq!(colors.prefix_for("web", "web"), "\x1b[32mweb\x1b[39m: ");
    }
}
