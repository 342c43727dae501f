use std::path::PathBuf;

use image::{Rgba, RgbaImage};
use thumbcraft::canvas::LayerKind;
use thumbcraft::compositor::PaintCommand;
use thumbcraft::error::{ExportError, ModelError};
use thumbcraft::io::{SourceHandle, encode_png};
use thumbcraft::ops::text::FontBook;
use thumbcraft::project::{Session, UploadOutcome};
use thumbcraft::script::{SessionScript, run_script};
use thumbcraft::selection::{EditableFields, Field};
use thumbcraft::settings::EditorSettings;

fn png(w: u32, h: u32, color: [u8; 4]) -> Vec<u8> {
    encode_png(&RgbaImage::from_pixel(w, h, Rgba(color))).unwrap()
}

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("thumbcraft-{}-{}", tag, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn session() -> Session {
    Session::new("test", EditorSettings::default())
}

#[test]
fn text_edit_then_export() {
    let mut session = session();
    let id = session.add_text();
    session.move_layer(id, 100.0, 120.0).unwrap();
    session.set_fill(id, "#ff00ff").unwrap();
    assert!(session.is_dirty);

    let frame = session.render();
    let draw = frame
        .commands
        .iter()
        .find(|c| matches!(c, PaintCommand::DrawText { .. }))
        .unwrap();
    match draw {
        PaintCommand::DrawText {
            x,
            y,
            fill,
            font_size,
            text,
            ..
        } => {
            assert_eq!((*x, *y), (100.0, 120.0));
            assert_eq!(fill.as_str(), "#ff00ff");
            assert_eq!(*font_size, 48.0);
            assert_eq!(text, "Hello World");
        }
        _ => unreachable!(),
    }

    let exported = session.export().unwrap();
    assert_eq!((exported.width, exported.height), (1200, 800));
    let decoded = image::load_from_memory(&exported.png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (1200, 800));
}

fn font_available() -> bool {
    FontBook::new(None).resolve("Arial").is_some()
}

fn draw_text_position(session: &Session) -> (f32, f32, String) {
    session
        .frame()
        .unwrap()
        .commands
        .iter()
        .find_map(|c| match c {
            PaintCommand::DrawText { x, y, fill, .. } => Some((*x, *y, fill.as_str().to_string())),
            _ => None,
        })
        .unwrap()
}

#[test]
fn export_picks_up_edits_made_after_render() {
    let mut session = session();
    let id = session.add_text();
    session.render();
    session.move_layer(id, 100.0, 120.0).unwrap();
    session.set_fill(id, "#ff00ff").unwrap();

    let exported = session.export().unwrap();
    assert_eq!(
        draw_text_position(&session),
        (100.0, 120.0, "#ff00ff".to_string())
    );
    assert_eq!((exported.width, exported.height), (1200, 800));

    let decoded = image::load_from_memory(&exported.png).unwrap().to_rgba8();
    // nothing covers the corner, and the stage has no background
    assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 0, 0]);

    if !font_available() {
        eprintln!("no font available, skipping pixel check");
        return;
    }
    let magenta = |x: u32, y: u32| decoded.get_pixel(x, y).0 == [255, 0, 255, 255];
    let near_layer = (240..400)
        .flat_map(|y| (200..1100).map(move |x| (x, y)))
        .filter(|&(x, y)| magenta(x, y))
        .count();
    assert!(near_layer > 500, "only {} fill pixels near the layer", near_layer);
    // the old position at (40, 40) holds no text any more
    let stale = (40..200)
        .flat_map(|y| (40..200).map(move |x| (x, y)))
        .filter(|&(x, y)| decoded.get_pixel(x, y).0[3] > 0)
        .count();
    assert_eq!(stale, 0);
}

#[test]
fn configured_pixel_ratio_is_ignored() {
    let settings = EditorSettings::from_toml("[export]\npixel_ratio = 1.0\n").unwrap();
    let mut session = Session::new("ratio", settings);
    session.render();
    let exported = session.export().unwrap();
    assert_eq!((exported.width, exported.height), (1200, 800));
}

#[test]
fn export_before_render_has_no_surface() {
    let mut session = session();
    session.add_text();
    assert!(matches!(session.export(), Err(ExportError::NoSurface)));
}

#[test]
fn upload_fits_image_and_resizes_stage() {
    let mut session = session();
    let handle = SourceHandle::from_bytes(png(1000, 1000, [0, 200, 0, 255]));
    assert!(session.upload(handle).is_none());
    assert!(session.layers().is_empty());

    let outcomes = session.wait_for_uploads();
    assert_eq!(outcomes.len(), 1);
    let layer_id = match &outcomes[0] {
        UploadOutcome::Placed { layer, size } => {
            assert_eq!(*size, (600.0, 600.0));
            *layer
        }
        other => panic!("expected placement, got {:?}", other),
    };

    let layer = session.layers().get(layer_id).unwrap();
    assert_eq!((layer.x, layer.y), (0.0, 0.0));
    assert!(matches!(
        layer.kind,
        LayerKind::Image { width, height, .. } if width == 600.0 && height == 600.0
    ));
    assert_eq!((session.stage().width, session.stage().height), (600.0, 600.0));

    let frame = session.render();
    assert_eq!(frame.painted_layers(), vec![layer_id]);
    let exported = session.export().unwrap();
    assert_eq!((exported.width, exported.height), (1200, 1200));
    let decoded = image::load_from_memory(&exported.png).unwrap().to_rgba8();
    assert_eq!(decoded.get_pixel(600, 600).0, [0, 200, 0, 255]);
}

#[test]
fn corrupt_upload_never_paints() {
    let mut session = session();
    session.upload(SourceHandle::from_bytes(b"not an image at all".to_vec()));
    let outcomes = session.wait_for_uploads();
    assert!(matches!(outcomes.as_slice(), [UploadOutcome::Failed(_)]));
    assert!(session.layers().is_empty());
    assert!(session.render().painted_layers().is_empty());
}

#[test]
fn reuploading_a_decoded_source_places_it_again() {
    let mut session = session();
    let handle = SourceHandle::from_bytes(png(40, 30, [9, 9, 9, 255]));
    session.upload(handle.clone());
    session.wait_for_uploads();

    let again = session.upload(handle);
    assert!(matches!(again, Some(UploadOutcome::Placed { size, .. }) if size == (40.0, 30.0)));
    assert_eq!(session.layers().len(), 2);
    assert_eq!(session.loader().decodes_started(), 1);
}

#[test]
fn same_source_uploaded_twice_while_pending_places_two_layers() {
    let mut session = session();
    let handle = SourceHandle::from_bytes(png(50, 40, [7, 7, 7, 255]));
    assert!(session.upload(handle.clone()).is_none());
    assert!(session.upload(handle).is_none());

    let outcomes = session.wait_for_uploads();
    assert_eq!(outcomes.len(), 2);
    assert!(
        outcomes
            .iter()
            .all(|o| matches!(o, UploadOutcome::Placed { size, .. } if *size == (50.0, 40.0)))
    );
    assert_eq!(session.layers().len(), 2);
    assert_eq!(session.loader().decodes_started(), 1);
}

#[test]
fn selection_drives_editable_fields() {
    let mut session = session();
    session.upload(SourceHandle::from_bytes(png(80, 60, [1, 2, 3, 255])));
    session.wait_for_uploads();
    let image_id = session.layers().get_index(0).unwrap().id;
    let text_id = session.add_text();

    assert!(session.editable_fields().is_none());

    session.select(text_id);
    let fields = session.editable_fields().unwrap();
    assert_eq!(fields.fields(), &[Field::Fill, Field::Outline]);

    session.select(image_id);
    let fields = session.editable_fields().unwrap();
    assert_eq!(fields.fields(), &[Field::Outline]);
    assert!(fields.outline().is_none());

    session.toggle_outline_selected(true).unwrap();
    match session.editable_fields().unwrap() {
        EditableFields::Image { outline } => {
            let outline = outline.unwrap();
            assert_eq!(outline.color.as_str(), "#ff0000");
            assert_eq!(outline.width, 4.0);
        }
        other => panic!("expected image fields, got {:?}", other),
    }

    // fill targets text only; the list is left as it was
    let before = session.layers().clone();
    let err = session.set_fill_selected("#00ff00").unwrap_err();
    assert!(matches!(err, ModelError::InvalidLayerKind { .. }));
    assert_eq!(session.layers(), &before);

    session.clear_selection();
    assert!(session.selection().is_none());
    session.set_fill_selected("#00ff00").unwrap();
    assert_eq!(session.layers(), &before);
}

#[test]
fn click_selects_top_most_image() {
    let mut session = session();
    session.upload(SourceHandle::from_bytes(png(100, 100, [1, 1, 1, 255])));
    session.wait_for_uploads();
    let id = session.layers().get_index(0).unwrap().id;

    assert_eq!(session.select_at(50.0, 50.0), Some(id));
    assert_eq!(session.selection(), Some(id));
    assert_eq!(session.select_at(500.0, 500.0), None);
    assert_eq!(session.selection(), None);
}

#[test]
fn edits_to_missing_layers_are_ignored() {
    let mut other = session();
    let foreign = other.add_text();

    let mut session = session();
    session.add_text();
    let before = session.layers().clone();
    session.move_layer(foreign, 5.0, 5.0).unwrap();
    assert_eq!(session.layers(), &before);
}

#[test]
fn invalid_color_is_rejected() {
    let mut session = session();
    let id = session.add_text();
    let err = session.set_fill(id, "magenta").unwrap_err();
    assert_eq!(err, ModelError::InvalidColor("magenta".to_string()));
}

#[test]
fn script_runs_end_to_end() {
    let dir = scratch_dir("script");
    std::fs::write(dir.join("photo.png"), png(1600, 1200, [200, 10, 10, 255])).unwrap();
    let script = SessionScript::parse(
        r##"
        [[action]]
        op = "upload"
        path = "photo.png"

        [[action]]
        op = "add_text"
        text = "Big News"

        [[action]]
        op = "select"
        layer = 1

        [[action]]
        op = "fill"
        color = "#00ffcc"

        [[action]]
        op = "outline"
        layer = 0
        enabled = true
        "##,
    )
    .unwrap();

    let out = dir.join("out");
    let (session, report) = run_script(&script, &dir, &out, EditorSettings::default()).unwrap();

    assert_eq!(report.layer_count, 2);
    assert!(report.warnings.is_empty());
    assert_eq!(report.exports, vec![out.join("thumbnail.png")]);
    assert_eq!((session.stage().width, session.stage().height), (800.0, 600.0));
    assert!(!session.is_dirty);

    let written = image::open(out.join("thumbnail.png")).unwrap();
    assert_eq!((written.width(), written.height()), (1600, 1200));

    match &session.layers().get_index(1).unwrap().kind {
        LayerKind::Text { text, fill, .. } => {
            assert_eq!(text, "Big News");
            assert_eq!(fill.as_str(), "#00ffcc");
        }
        other => panic!("expected text layer, got {:?}", other),
    }
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn script_with_broken_upload_still_exports() {
    let dir = scratch_dir("broken");
    std::fs::write(dir.join("broken.png"), b"garbage").unwrap();
    let script = SessionScript::parse(
        "[[action]]\nop = \"upload\"\npath = \"broken.png\"\n\n[[action]]\nop = \"export\"\n",
    )
    .unwrap();

    let (session, report) = run_script(&script, &dir, &dir, EditorSettings::default()).unwrap();
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.exports.len(), 1);
    assert!(session.layers().is_empty());
    let written = image::open(dir.join("thumbnail.png")).unwrap();
    assert_eq!((written.width(), written.height()), (1200, 800));
    let _ = std::fs::remove_dir_all(&dir);
}
