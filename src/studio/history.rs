//! The image-edit history state machine.
//!
//! `image_history` is ordered newest first; `edit_history` oldest first.
//! Every edit's destination id appears in `image_history`. Generating from a
//! non-newest record linearizes the branch by dropping everything newer than
//! the source before prepending the result.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EditRecord, ImageOrigin, ImageRecord, SpotPoint};

/// Words dropped when deriving a display caption from a prompt.
const CAPTION_STOP_WORDS: [&str; 12] = [
    "add", "change", "make", "with", "and", "the", "a", "an", "to", "in", "on", "for",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudioState {
    #[serde(default)]
    pub original: Option<ImageRecord>,
    #[serde(default)]
    pub current: Option<ImageRecord>,
    #[serde(default)]
    pub image_history: Vec<ImageRecord>,
    #[serde(default)]
    pub edit_history: Vec<EditRecord>,
}

impl StudioState {
    /// Installs an uploaded image as the new root. Any previous history is
    /// replaced wholesale.
    pub fn load_original(&mut self, record: ImageRecord) {
        self.original = Some(record.clone());
        self.current = Some(record.clone());
        self.image_history = vec![record];
        self.edit_history.clear();
    }

    /// Records a full-image generation derived from the current record.
    /// Returns the new record, or `None` when there is no current image.
    pub fn record_design(
        &mut self,
        data_url: String,
        thumbnail: Option<String>,
        prompt: &str,
    ) -> Option<ImageRecord> {
        self.push_generated(data_url, thumbnail, derive_caption(prompt), prompt, None)
    }

    /// Records a spot edit anchored at `spot`, derived from the current record.
    pub fn record_spot_edit(
        &mut self,
        data_url: String,
        thumbnail: Option<String>,
        prompt: &str,
        spot: SpotPoint,
    ) -> Option<ImageRecord> {
        let caption = format!("Spot edit: {prompt}");
        self.push_generated(data_url, thumbnail, caption, prompt, Some(spot))
    }

    fn push_generated(
        &mut self,
        data_url: String,
        thumbnail: Option<String>,
        caption: String,
        prompt: &str,
        spot: Option<SpotPoint>,
    ) -> Option<ImageRecord> {
        let source = self.current.clone()?;
        let now = Utc::now();
        let record = ImageRecord {
            id: Uuid::new_v4(),
            data_url,
            thumbnail,
            origin: ImageOrigin::Generated,
            caption: Some(caption),
            original_prompt: Some(prompt.to_string()),
            spot,
            parent_id: Some(source.id),
            created_at: now,
        };

        // Linearize: anything newer than the source is a stale sibling branch.
        if let Some(idx) = self.index_of(source.id) {
            self.image_history.drain(..idx);
        }
        self.image_history.insert(0, record.clone());
        self.edit_history.push(EditRecord {
            id: Uuid::new_v4(),
            prompt: prompt.to_string(),
            from_image: source.id,
            to_image: record.id,
            spot,
            created_at: now,
        });
        self.current = Some(record.clone());
        Some(record)
    }

    /// Makes a history record current. Selecting anything but the newest
    /// record trims edits whose destination is newer than the selection.
    pub fn select(&mut self, id: Uuid) {
        let Some(idx) = self.index_of(id) else {
            return;
        };
        let record = self.image_history[idx].clone();
        let already_current = self.current.as_ref().is_some_and(|c| c.id == id);
        if !already_current && idx > 0 {
            let kept: Vec<Uuid> = self.image_history[idx..].iter().map(|r| r.id).collect();
            self.edit_history.retain(|e| kept.contains(&e.to_image));
        }
        self.current = Some(record);
    }

    /// Steps back one edit: the current record and its producing edit are
    /// removed together, and the next-older record becomes current.
    pub fn undo(&mut self) {
        if self.image_history.len() <= 1 {
            return;
        }
        let Some(current) = self.current.clone() else {
            return;
        };
        let Some(idx) = self.index_of(current.id) else {
            return;
        };
        if idx + 1 >= self.image_history.len() {
            return;
        }
        let previous = self.image_history[idx + 1].clone();
        self.image_history.retain(|r| r.id != current.id);
        self.edit_history.retain(|e| e.to_image != current.id);
        self.current = Some(previous);
    }

    /// Collapses the history back to just the original upload.
    pub fn reset_to_original(&mut self) {
        if let Some(original) = self.original.clone() {
            self.current = Some(original.clone());
            self.image_history = vec![original];
            self.edit_history.clear();
        }
    }

    pub fn clear(&mut self) {
        *self = StudioState::default();
    }

    pub fn can_undo(&self) -> bool {
        self.image_history.len() > 1
            && self.current.as_ref().is_some_and(|c| !c.is_original())
    }

    pub fn can_reset(&self) -> bool {
        match (&self.original, &self.current) {
            (Some(original), Some(current)) => original.id != current.id,
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_none() && self.current.is_none()
    }

    fn index_of(&self, id: Uuid) -> Option<usize> {
        self.image_history.iter().position(|r| r.id == id)
    }
}

/// Derives a short caption from a prompt: stop words removed, first ten
/// words kept, first letter upper-cased.
pub fn derive_caption(prompt: &str) -> String {
    let caption = prompt
        .to_lowercase()
        .split_whitespace()
        .filter(|w| !CAPTION_STOP_WORDS.contains(w))
        .take(10)
        .collect::<Vec<_>>()
        .join(" ");
    let mut chars = caption.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => caption,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(state: &mut StudioState) -> ImageRecord {
        let record = ImageRecord::original("data:image/jpeg;base64,AAAA".to_string(), None);
        state.load_original(record.clone());
        record
    }

    fn generate(state: &mut StudioState, prompt: &str) -> ImageRecord {
        state
            .record_design(format!("data:image/png;base64,{prompt}"), None, prompt)
            .expect("generation requires a current image")
    }

    #[test]
    fn load_original_resets_everything() {
        let mut state = StudioState::default();
        upload(&mut state);
        generate(&mut state, "sage green walls please");

        let second = upload(&mut state);
        assert_eq!(state.image_history.len(), 1);
        assert!(state.edit_history.is_empty());
        assert_eq!(state.current.as_ref().map(|c| c.id), Some(second.id));
        assert!(!state.can_undo());
        assert!(!state.can_reset());
    }

    #[test]
    fn record_design_prepends_and_links_edit() {
        let mut state = StudioState::default();
        let original = upload(&mut state);
        let generated = generate(&mut state, "replace sofa with navy sectional");

        assert_eq!(state.image_history.len(), 2);
        assert_eq!(state.image_history[0].id, generated.id);
        assert_eq!(state.image_history[1].id, original.id);
        assert_eq!(generated.parent_id, Some(original.id));

        assert_eq!(state.edit_history.len(), 1);
        let edit = &state.edit_history[0];
        assert_eq!(edit.from_image, original.id);
        assert_eq!(edit.to_image, generated.id);
        assert!(state.can_undo());
        assert!(state.can_reset());
    }

    #[test]
    fn every_edit_destination_appears_in_history() {
        let mut state = StudioState::default();
        upload(&mut state);
        generate(&mut state, "first change here ok");
        generate(&mut state, "second change here ok");

        for edit in &state.edit_history {
            assert!(state.image_history.iter().any(|r| r.id == edit.to_image));
        }
    }

    #[test]
    fn generating_from_older_record_linearizes_branch() {
        let mut state = StudioState::default();
        let original = upload(&mut state);
        let first = generate(&mut state, "first variant of room");
        let _second = generate(&mut state, "second variant of room");

        // Go back to the first variant and branch from there.
        state.select(first.id);
        let branched = generate(&mut state, "branched variant of room");

        let ids: Vec<Uuid> = state.image_history.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![branched.id, first.id, original.id]);
        assert!(state
            .edit_history
            .iter()
            .all(|e| ids.contains(&e.to_image)));
    }

    #[test]
    fn select_older_record_trims_newer_edits() {
        let mut state = StudioState::default();
        upload(&mut state);
        let first = generate(&mut state, "first variant of room");
        generate(&mut state, "second variant of room");
        assert_eq!(state.edit_history.len(), 2);

        state.select(first.id);
        assert_eq!(state.current.as_ref().map(|c| c.id), Some(first.id));
        assert_eq!(state.edit_history.len(), 1);
        assert_eq!(state.edit_history[0].to_image, first.id);
    }

    #[test]
    fn select_unknown_id_is_ignored() {
        let mut state = StudioState::default();
        let original = upload(&mut state);
        state.select(Uuid::new_v4());
        assert_eq!(state.current.as_ref().map(|c| c.id), Some(original.id));
    }

    #[test]
    fn undo_removes_record_and_edit_atomically() {
        let mut state = StudioState::default();
        let original = upload(&mut state);
        let first = generate(&mut state, "first variant of room");
        let second = generate(&mut state, "second variant of room");

        state.undo();
        assert_eq!(state.current.as_ref().map(|c| c.id), Some(first.id));
        assert!(state.image_history.iter().all(|r| r.id != second.id));
        assert!(state.edit_history.iter().all(|e| e.to_image != second.id));
        assert_eq!(state.image_history.len(), 2);
        assert_eq!(state.edit_history.len(), 1);

        state.undo();
        assert_eq!(state.current.as_ref().map(|c| c.id), Some(original.id));
        assert!(state.edit_history.is_empty());

        // Nothing left to undo.
        state.undo();
        assert_eq!(state.image_history.len(), 1);
    }

    #[test]
    fn undo_on_oldest_record_does_nothing() {
        let mut state = StudioState::default();
        let original = upload(&mut state);
        let first = generate(&mut state, "first variant of room");

        state.select(original.id);
        state.undo();
        // Current sits on the oldest record; history is untouched.
        assert_eq!(state.image_history.len(), 2);
        assert!(state.image_history.iter().any(|r| r.id == first.id));
    }

    #[test]
    fn reset_collapses_to_original() {
        let mut state = StudioState::default();
        let original = upload(&mut state);
        generate(&mut state, "first variant of room");
        generate(&mut state, "second variant of room");

        state.reset_to_original();
        assert_eq!(state.image_history.len(), 1);
        assert_eq!(state.image_history[0].id, original.id);
        assert!(state.edit_history.is_empty());
        assert!(!state.can_reset());
        assert!(!state.can_undo());
    }

    #[test]
    fn clear_drops_everything() {
        let mut state = StudioState::default();
        upload(&mut state);
        generate(&mut state, "first variant of room");

        state.clear();
        assert!(state.is_empty());
        assert!(state.image_history.is_empty());
        assert!(state.edit_history.is_empty());
    }

    #[test]
    fn spot_edit_carries_coordinates() {
        let mut state = StudioState::default();
        upload(&mut state);
        let spot = SpotPoint { x: 42.5, y: 13.0 };
        let record = state
            .record_spot_edit(
                "data:image/jpeg;base64,BBBB".to_string(),
                None,
                "swap the lamp",
                spot,
            )
            .expect("spot edit requires a current image");

        assert_eq!(record.spot, Some(spot));
        assert_eq!(record.caption.as_deref(), Some("Spot edit: swap the lamp"));
        assert_eq!(state.edit_history[0].spot, Some(spot));
    }

    #[test]
    fn caption_strips_stop_words_and_caps_length() {
        assert_eq!(
            derive_caption("Add a large plant in the corner"),
            "Large plant corner"
        );
        assert_eq!(
            derive_caption("change the wall color to sage green"),
            "Wall color sage green"
        );
        let long = "one two three four five six seven eight nine ten eleven twelve";
        assert_eq!(derive_caption(long).split_whitespace().count(), 10);
        assert_eq!(derive_caption(""), "");
    }
}
