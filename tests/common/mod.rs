#![allow(dead_code)]

pub mod apps;

use ui_transfer::event::event_model::{EventAction, TargetEvent};
use ui_transfer::widget::widget_model::Widget;

pub fn button(rid: &str, text: &str) -> Widget {
    Widget::new("android.widget.Button")
        .with_id(rid)
        .with_text(text)
        .with_clickable(true)
}

pub fn text_view(text: &str) -> Widget {
    Widget::new("android.widget.TextView")
        .with_text(text)
        .with_clickable(false)
}

pub fn scored(widget: Widget, action: EventAction, score: f64) -> TargetEvent {
    TargetEvent::new(widget, action).with_score(score)
}
