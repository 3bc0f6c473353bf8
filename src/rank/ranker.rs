use tracing::info;

use crate::event::event_model::{EventAction, SourceEvent};
use crate::rank::oracle::SimilarityOracle;
use crate::rank::similarity::similarity;
use crate::widget::widget_model::Widget;

pub const DEFAULT_TOP: usize = 12;

const BUTTON: &str = "android.widget.Button";
const IMAGE_BUTTON: &str = "android.widget.ImageButton";
const EDIT_TEXT: &str = "android.widget.EditText";
const TEXT_VIEW: &str = "android.widget.TextView";
const VIEW: &str = "android.view.View";
const CHECKED_TEXT_VIEW: &str = "android.widget.CheckedTextView";
const IMAGE_VIEW: &str = "android.widget.ImageView";

/// A widget with its similarity to the source event.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub widget: Widget,
    pub score: f64,
}

/// Whether `widget` can take `src`'s action at all.
pub fn is_compatible(src: &SourceEvent, widget: &Widget) -> bool {
    let class = widget.class.as_str();
    match src.action {
        EventAction::Click => {
            widget.is_clickable()
                || class == BUTTON
                || class == IMAGE_BUTTON
                || widget.menu_group.is_some()
        }
        EventAction::TextPresent => [TEXT_VIEW, VIEW, CHECKED_TEXT_VIEW].contains(&class),
        EventAction::SendKeys | EventAction::Clear => class == EDIT_TEXT,
        EventAction::IsDisplayed | EventAction::IsAttrEqual => {
            [TEXT_VIEW, VIEW, IMAGE_VIEW].contains(&class)
                || (class == BUTTON && src.tag.eq_ignore_ascii_case("button"))
        }
        // No element is ranked for these: absence is asserted directly and
        // hovers are merged away before exploration.
        EventAction::TextNotPresent | EventAction::MoveToElement => false,
    }
}

/// Rank action-compatible widgets against `src`.
///
/// Descending by score (ties keep pool order), truncated to `top`, with
/// non-positive scores dropped.
pub fn sort_candidates<'a, O: SimilarityOracle + ?Sized>(
    src: &SourceEvent,
    pool: impl IntoIterator<Item = &'a Widget>,
    oracle: &O,
    use_stopwords: bool,
    top: usize,
) -> Vec<Candidate> {
    let compatible: Vec<&Widget> = pool
        .into_iter()
        .filter(|w| is_compatible(src, w))
        .collect();
    info!("{} candidate widgets to sort...", compatible.len());

    let mut candidates: Vec<Candidate> = compatible
        .into_iter()
        .map(|w| Candidate {
            score: similarity(src, w, oracle, use_stopwords),
            widget: w.clone(),
        })
        .collect();

    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(top);
    candidates.retain(|c| c.score > 0.0);
    candidates
}
