use crate::market_data::PriceSeries;
use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading sessions, keyed by UTC hour of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Session {
    Asian,  // [00:00, 06:00)
    London, // [06:00, 12:00)
    Us,     // [13:00, 20:00)
}

impl Session {
    pub const ALL: [Session; 3] = [Session::Asian, Session::London, Session::Us];

    /// Half-open `[start, end)` hour interval. 12:00-13:00 and 20:00-24:00
    /// belong to no session.
    pub fn hours(&self) -> (u32, u32) {
        match self {
            Session::Asian => (0, 6),
            Session::London => (6, 12),
            Session::Us => (13, 20),
        }
    }

    pub fn contains_hour(&self, hour: u32) -> bool {
        let (start, end) = self.hours();
        (start..end).contains(&hour)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Session::Asian => "Asian",
            Session::London => "London",
            Session::Us => "US",
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Historical range of one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionWindow {
    pub session: Session,
    pub max_high: f64,
    pub min_low: f64,
    pub bar_count: usize,
}

impl SessionWindow {
    /// Strictly outside the range on either side.
    pub fn is_broken_by(&self, price: f64) -> bool {
        price > self.max_high || price < self.min_low
    }
}

/// Sessions whose range the latest close has broken, in session order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BreakoutSet {
    sessions: Vec<Session>,
}

impl BreakoutSet {
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, session: Session) -> bool {
        self.sessions.contains(&session)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.sessions.iter().map(Session::name).collect()
    }
}

impl FromIterator<Session> for BreakoutSet {
    fn from_iter<I: IntoIterator<Item = Session>>(iter: I) -> Self {
        Self {
            sessions: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionBreakoutDetector;

impl SessionBreakoutDetector {
    pub fn new() -> Self {
        Self
    }

    /// High/low range of every session that has at least one bar. The
    /// latest bar counts towards its own session's range.
    pub fn session_windows(&self, series: &PriceSeries) -> Vec<SessionWindow> {
        Session::ALL
            .iter()
            .filter_map(|&session| {
                let mut window: Option<SessionWindow> = None;
                for bar in series
                    .bars()
                    .iter()
                    .filter(|b| session.contains_hour(b.timestamp.hour()))
                {
                    let w = window.get_or_insert(SessionWindow {
                        session,
                        max_high: bar.high,
                        min_low: bar.low,
                        bar_count: 0,
                    });
                    w.max_high = w.max_high.max(bar.high);
                    w.min_low = w.min_low.min(bar.low);
                    w.bar_count += 1;
                }
                window
            })
            .collect()
    }

    /// Sessions broken by the latest close.
    pub fn detect(&self, series: &PriceSeries) -> BreakoutSet {
        let Some(latest) = series.latest() else {
            return BreakoutSet::default();
        };
        self.session_windows(series)
            .into_iter()
            .filter(|w| w.is_broken_by(latest.close))
            .map(|w| w.session)
            .collect()
    }
}
