//! Omikuji drawing.
//!
//! An omikuji is a paper fortune drawn at a shrine, ranging from a great
//! blessing down to a curse. Drawing one is traced as a child span of the
//! request, with the verdict recorded as an event.

use std::time::Duration;

use chrono::{Datelike, Local};
use microtrace::trace::Tracer;
use microtrace::Context;
use rand::Rng;

/// A drawn fortune, best to worst.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fortune {
    /// 大吉, a great blessing.
    GreatBlessing,
    /// 中吉, a middle blessing.
    MiddleBlessing,
    /// 吉, a blessing.
    Blessing,
    /// 凶, a curse.
    Curse,
}

impl Fortune {
    /// The traditional label written on the fortune slip.
    pub fn label(&self) -> &'static str {
        match self {
            Fortune::GreatBlessing => "大吉",
            Fortune::MiddleBlessing => "中吉",
            Fortune::Blessing => "吉",
            Fortune::Curse => "凶",
        }
    }
}

/// Draws a fortune as a child span of `cx`.
///
/// During the New Year holiday (January 1st through 3rd) everyone draws a
/// great blessing. A curse takes a while to read.
pub async fn draw(tracer: &Tracer, cx: &Context) -> Fortune {
    let mut span = tracer.start("omikuji", cx);

    let today = Local::now();
    let (fortune, message) = if today.month() == 1 && (1..=3).contains(&today.day()) {
        (Fortune::GreatBlessing, "お正月は大吉")
    } else {
        match rand::thread_rng().gen_range(0..6) {
            0 => (Fortune::Curse, "残念でした"),
            1 | 2 => (Fortune::Blessing, "そこそこでした"),
            3 | 4 => (Fortune::MiddleBlessing, "まあまあでした"),
            _ => (Fortune::GreatBlessing, "いいですね"),
        }
    };
    if fortune == Fortune::Curse {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    span.add_event(message, vec![]);
    span.end();
    fortune
}
