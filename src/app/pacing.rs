use std::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;

/// Randomized waits between browser navigations. Keeps traversal below the
/// site's anti-scraping thresholds.
#[derive(Debug, Clone)]
pub struct Pacing {
    navigation_ms: RangeInclusive<u64>,
    page_turn_ms: RangeInclusive<u64>,
    login_settle_ms: RangeInclusive<u64>,
}

impl Pacing {
    pub fn polite() -> Self {
        Self {
            navigation_ms: 2_000..=3_000,
            page_turn_ms: 3_000..=4_000,
            login_settle_ms: 5_000..=6_000,
        }
    }

    /// No waiting at all. Used for fakes.
    pub fn none() -> Self {
        Self {
            navigation_ms: 0..=0,
            page_turn_ms: 0..=0,
            login_settle_ms: 0..=0,
        }
    }

    pub async fn after_navigation(&self) {
        wait_random(&self.navigation_ms).await;
    }

    pub async fn after_page_turn(&self) {
        wait_random(&self.page_turn_ms).await;
    }

    pub async fn after_login(&self) {
        wait_random(&self.login_settle_ms).await;
    }
}

fn jitter(range: &RangeInclusive<u64>) -> Duration {
    if range.end() <= range.start() {
        return Duration::from_millis(*range.start());
    }
    Duration::from_millis(rand::rng().random_range(range.clone()))
}

async fn wait_random(range: &RangeInclusive<u64>) {
    let delay = jitter(range);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_inside_window() {
        let window = 2_000..=4_000;
        for _ in 0..200 {
            let delay = jitter(&window).as_millis() as u64;
            assert!(window.contains(&delay), "{delay} outside window");
        }
    }

    #[test]
    fn degenerate_window_is_fixed() {
        assert_eq!(jitter(&(0..=0)), Duration::ZERO);
        assert_eq!(jitter(&(250..=250)), Duration::from_millis(250));
    }
}
