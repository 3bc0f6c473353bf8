use crate::event::event_model::SourceEvent;
use crate::rank::oracle::SimilarityOracle;
use crate::text::tokenizer::{FieldKind, tokenize};
use crate::widget::widget_model::Widget;

/// Score returned when either side carries no textual information at all.
pub const INCOMPARABLE: f64 = -1.0;

const WEIGHTS: [(FieldKind, f64); 5] = [
    (FieldKind::ResourceId, 1.0),
    (FieldKind::Text, 1.0),
    (FieldKind::ContentDesc, 1.0),
    (FieldKind::ParentText, 1.0),
    (FieldKind::SiblingText, 0.5),
];

const CROSS_PAIRS: [(FieldKind, FieldKind); 6] = [
    (FieldKind::Text, FieldKind::ParentText),
    (FieldKind::ParentText, FieldKind::Text),
    (FieldKind::ContentDesc, FieldKind::Text),
    (FieldKind::Text, FieldKind::ContentDesc),
    (FieldKind::SiblingText, FieldKind::Text),
    (FieldKind::Text, FieldKind::SiblingText),
];

/// Read-only view over the comparable attributes of either side.
///
/// A source event's plain `id` stands in for its resource id here only; the
/// event itself is never modified.
#[derive(Debug, Clone, Copy)]
pub struct Attributes<'a> {
    resource_id: &'a str,
    text: &'a str,
    content_desc: &'a str,
    parent_text: &'a str,
    sibling_text: &'a str,
}

impl<'a> Attributes<'a> {
    fn get(&self, kind: FieldKind) -> &'a str {
        match kind {
            FieldKind::ResourceId => self.resource_id,
            FieldKind::Text => self.text,
            FieldKind::ContentDesc => self.content_desc,
            FieldKind::ParentText => self.parent_text,
            FieldKind::SiblingText => self.sibling_text,
            FieldKind::Screen => "",
        }
    }

    fn has_textual_info(&self) -> bool {
        WEIGHTS.iter().any(|(kind, _)| !self.get(*kind).is_empty())
    }

    fn lacks_direct_text(&self) -> bool {
        self.text.is_empty() && self.parent_text.is_empty()
    }
}

impl<'a> From<&'a SourceEvent> for Attributes<'a> {
    fn from(event: &'a SourceEvent) -> Self {
        Self {
            resource_id: event.effective_resource_id(),
            text: &event.text,
            content_desc: &event.content_desc,
            parent_text: &event.parent_text,
            sibling_text: &event.sibling_text,
        }
    }
}

impl<'a> From<&'a Widget> for Attributes<'a> {
    fn from(widget: &'a Widget) -> Self {
        Self {
            resource_id: &widget.resource_id,
            text: &widget.text,
            content_desc: &widget.content_desc,
            parent_text: &widget.parent_text,
            sibling_text: &widget.sibling_text,
        }
    }
}

/// What a scored pair contributes to the final mean.
enum Contribution {
    Direct { weight: f64 },
    Cross,
}

/// Weighted multi-attribute similarity in `[-1, 1]`.
///
/// Attributes non-empty on both sides are scored by the oracle (unknown
/// counts as 0). The best positive cross-attribute score, if any, is added
/// as one more term. The result is the mean of all terms; `-1` flags a side
/// with no textual information.
pub fn similarity<O: SimilarityOracle + ?Sized>(
    src: &SourceEvent,
    tgt: &Widget,
    oracle: &O,
    use_stopwords: bool,
) -> f64 {
    let src = Attributes::from(src);
    let tgt = Attributes::from(tgt);

    if !src.has_textual_info() || !tgt.has_textual_info() {
        return INCOMPARABLE;
    }

    let mut pairs = Vec::new();
    let mut contributions = Vec::new();

    for (kind, weight) in WEIGHTS {
        let (a, b) = (src.get(kind), tgt.get(kind));
        if a.is_empty() || b.is_empty() {
            continue;
        }
        let weight = if kind == FieldKind::SiblingText
            && src.lacks_direct_text()
            && tgt.lacks_direct_text()
        {
            weight * 2.0
        } else {
            weight
        };
        pairs.push((
            tokenize(kind, a, use_stopwords),
            tokenize(kind, b, use_stopwords),
        ));
        contributions.push(Contribution::Direct { weight });
    }

    for (src_kind, tgt_kind) in CROSS_PAIRS {
        let (a, b) = (src.get(src_kind), tgt.get(tgt_kind));
        if a.is_empty() || b.is_empty() {
            continue;
        }
        pairs.push((
            tokenize(src_kind, a, use_stopwords),
            tokenize(tgt_kind, b, use_stopwords),
        ));
        contributions.push(Contribution::Cross);
    }

    let scores = oracle.score_batch(&pairs);

    let mut terms = Vec::new();
    let mut best_cross: Option<f64> = None;
    for (contribution, score) in contributions.iter().zip(scores) {
        match contribution {
            Contribution::Direct { weight } => {
                terms.push(score.unwrap_or(0.0) * weight);
            }
            Contribution::Cross => {
                if let Some(s) = score.filter(|s| *s > 0.0) {
                    best_cross = Some(best_cross.map_or(s, |b| b.max(s)));
                }
            }
        }
    }
    terms.extend(best_cross);

    if terms.is_empty() {
        return 0.0;
    }
    terms.iter().sum::<f64>() / terms.len() as f64
}
