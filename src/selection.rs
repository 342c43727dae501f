use crate::canvas::{Color, LayerId, LayerKind, LayerList, Outline};

/// A field the editing panel may change on the selected layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Fill,
    Outline,
}

/// Current values of the selected layer's editable fields.
#[derive(Clone, Debug, PartialEq)]
pub enum EditableFields<'a> {
    Text {
        fill: &'a Color,
        outline: Option<&'a Outline>,
    },
    Image {
        outline: Option<&'a Outline>,
    },
}

impl EditableFields<'_> {
    pub fn fields(&self) -> &'static [Field] {
        match self {
            EditableFields::Text { .. } => &[Field::Fill, Field::Outline],
            EditableFields::Image { .. } => &[Field::Outline],
        }
    }

    pub fn outline(&self) -> Option<&Outline> {
        match self {
            EditableFields::Text { outline, .. } | EditableFields::Image { outline } => *outline,
        }
    }
}

/// At most one active layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    active: Option<LayerId>,
}

impl Selection {
    pub fn select(&mut self, id: LayerId) {
        self.active = Some(id);
    }

    pub fn clear(&mut self) {
        self.active = None;
    }

    pub fn selected(&self) -> Option<LayerId> {
        self.active
    }

    /// Drop the selection if its layer is no longer in `list`.
    pub fn retain_in(&mut self, list: &LayerList) {
        if let Some(id) = self.active
            && !list.contains(id)
        {
            self.active = None;
        }
    }

    pub fn current_editable_fields<'a>(&self, list: &'a LayerList) -> Option<EditableFields<'a>> {
        let layer = list.get(self.active?)?;
        let outline = layer.outline.as_ref();
        Some(match &layer.kind {
            LayerKind::Text { fill, .. } => EditableFields::Text { fill, outline },
            LayerKind::Image { .. } => EditableFields::Image { outline },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::TextDefaults;
    use crate::io::SourceHandle;

    fn list() -> LayerList {
        LayerList::new()
            .add_image_layer(SourceHandle::from_bytes(vec![1u8]), 50.0, 50.0, (0.0, 0.0))
            .unwrap()
            .add_text_layer(&TextDefaults::default())
    }

    #[test]
    fn nothing_selected_has_no_fields() {
        assert!(Selection::default().current_editable_fields(&list()).is_none());
    }

    #[test]
    fn text_exposes_fill_and_outline() {
        let list = list();
        let mut selection = Selection::default();
        selection.select(list.get_index(1).unwrap().id);
        let fields = selection.current_editable_fields(&list).unwrap();
        assert_eq!(fields.fields(), &[Field::Fill, Field::Outline]);
        match fields {
            EditableFields::Text { fill, outline } => {
                assert_eq!(fill.as_str(), "#ffffff");
                assert!(outline.is_none());
            }
            other => panic!("expected text fields, got {:?}", other),
        }
    }

    #[test]
    fn image_exposes_outline_only() {
        let list = list();
        let id = list.get_index(0).unwrap().id;
        let list = list.toggle_outline(id, true, &Outline::default()).unwrap();
        let mut selection = Selection::default();
        selection.select(id);
        let fields = selection.current_editable_fields(&list).unwrap();
        assert_eq!(fields.fields(), &[Field::Outline]);
        assert_eq!(fields.outline(), Some(&Outline::default()));
    }

    #[test]
    fn stale_selection_is_cleared() {
        let other = list();
        let mut selection = Selection::default();
        selection.select(other.get_index(0).unwrap().id);

        let current = list();
        assert!(selection.current_editable_fields(&current).is_none());
        selection.retain_in(&current);
        assert_eq!(selection.selected(), None);
    }
}
