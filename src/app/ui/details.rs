use eframe::egui::{self, RichText, Ui};

use crate::util::{clip_label, format_strength};

use super::super::ViewModel;
use super::super::interaction::ViewEvent;

const CONTENT_PREVIEW_CHARS: usize = 600;

fn describe_event(event: &ViewEvent) -> String {
    match event {
        ViewEvent::Hover(Some(id)) => format!("hover {id}"),
        ViewEvent::Hover(None) => "hover cleared".to_owned(),
        ViewEvent::DragStart { id, position } => {
            format!("drag start {id} ({:.0}, {:.0})", position.x, position.y)
        }
        ViewEvent::DragMove { id, position } => {
            format!("drag {id} ({:.0}, {:.0})", position.x, position.y)
        }
        ViewEvent::DragEnd { id, position } => {
            format!("drag end {id} ({:.0}, {:.0})", position.x, position.y)
        }
        ViewEvent::AnimationComplete => "animation complete".to_owned(),
    }
}

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        egui::ScrollArea::vertical().show(ui, |ui| {
            ui.heading("Point");
            ui.add_space(6.0);
            self.draw_hovered(ui);

            ui.separator();
            ui.heading("Results");
            ui.add_space(4.0);
            if self.snapshot.results.is_empty() {
                ui.label("No results in this snapshot.");
            }
            let overlay = &self.view.context().overlay;
            for (rank, result) in self.snapshot.results.iter().enumerate() {
                let label = self
                    .snapshot
                    .index_of(&result.id)
                    .map(|index| self.snapshot.points[index].label.as_str())
                    .unwrap_or(result.id.as_str());
                let revealed = !overlay.is_active() || overlay.mark(&result.id).is_some();
                let text = RichText::new(format!(
                    "#{} {} ({})",
                    rank + 1,
                    clip_label(label, 36),
                    format_strength(result.strength)
                ));
                ui.label(if revealed { text } else { text.weak() });
            }

            ui.separator();
            ui.heading("Events");
            ui.add_space(4.0);
            if self.recent_events.is_empty() {
                ui.small("Nothing yet.");
            }
            for event in self.recent_events.iter().rev() {
                ui.small(describe_event(event));
            }
        });
    }

    fn draw_hovered(&self, ui: &mut Ui) {
        let Some(id) = &self.hovered else {
            ui.label("Hover a point to inspect it.");
            return;
        };
        let Some(point) = self
            .snapshot
            .index_of(id)
            .map(|index| &self.snapshot.points[index])
        else {
            ui.label("The hovered point is no longer in the snapshot.");
            return;
        };

        ui.label(RichText::new(&point.label).strong());
        ui.small(point.id.as_str());
        if let Some(strength) = self.snapshot.strength_of(id) {
            let rank = self.snapshot.result_rank(id).map(|rank| rank + 1).unwrap_or(0);
            ui.label(format!("Result #{rank}, score {}", format_strength(strength)));
        }
        let coordinates = match point.z {
            Some(z) => format!("({:.3}, {:.3}, {:.3})", point.x, point.y, z),
            None => format!("({:.3}, {:.3})", point.x, point.y),
        };
        ui.small(format!("coordinates {coordinates}"));
        if !point.content.is_empty() {
            ui.add_space(4.0);
            ui.label(clip_label(&point.content, CONTENT_PREVIEW_CHARS).into_owned());
        }
    }
}
