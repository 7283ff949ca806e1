//! Property-based tests for pdfsuite-core
//!
//! Page selection, placement and templating invariants, plus a few
//! document-level round trips.

use lopdf::{dictionary, Document, Object, Stream};
use pdfsuite_core::placement::{anchor_point, place, visual_center};
use pdfsuite_core::{
    assemble_pages, render_page_text, resolve, rotate_pages, validate_range_syntax,
    validate_selection, Anchor, DocumentView, PageSize, PageTarget, RotateSpec, SelectionMode,
    TextExtent,
};
use proptest::prelude::*;
use std::collections::HashSet;

// ============================================================
// Strategies
// ============================================================

/// A view over a document of up to 30 pages, with pages hidden and shuffled.
fn view_strategy() -> impl Strategy<Value = (DocumentView, usize)> {
    (1usize..30)
        .prop_flat_map(|count| {
            (
                Just(count),
                Just((0..count).collect::<Vec<_>>()).prop_shuffle(),
                0..=count,
            )
        })
        .prop_map(|(count, pages, keep)| {
            let pages = pages.into_iter().take(keep.max(1)).collect();
            (DocumentView::new(pages, count).unwrap(), count)
        })
}

fn range_token() -> impl Strategy<Value = String> {
    prop_oneof![
        (0i64..40).prop_map(|p| p.to_string()),
        (0i64..40, 0i64..40).prop_map(|(a, b)| format!("{}-{}", a, b)),
        "[a-z]{1,3}",
    ]
}

fn range_string() -> impl Strategy<Value = String> {
    prop::collection::vec(range_token(), 1..6).prop_map(|tokens| tokens.join(", "))
}

fn pdf_with_pages(count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..count)
        .map(|i| {
            let content = format!("BT /F1 12 Tf 72 720 Td (Page {}) Tj ET", i + 1);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            Object::Reference(doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => Object::Reference(content_id),
            }))
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => count as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn rotations(bytes: &[u8]) -> Vec<i64> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|&id| {
            doc.get_dictionary(id)
                .unwrap()
                .get(b"Rotate")
                .and_then(Object::as_i64)
                .unwrap_or(0)
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // ============================================================
    // Selection Tests
    // ============================================================

    #[test]
    fn all_mode_yields_one_group_per_view_page((view, _) in view_strategy()) {
        let plan = resolve(&view, &SelectionMode::All);
        prop_assert_eq!(plan.len(), view.len());
        for (group, &page) in plan.iter().zip(view.pages()) {
            prop_assert_eq!(group, &vec![page]);
        }
    }

    #[test]
    fn resolved_pages_always_come_from_the_view(
        (view, _) in view_strategy(),
        ranges in range_string(),
    ) {
        let visible: HashSet<usize> = view.pages().iter().copied().collect();
        for group in resolve(&view, &SelectionMode::Ranges(ranges)) {
            for page in group {
                prop_assert!(visible.contains(&page));
            }
        }
    }

    #[test]
    fn range_groups_are_contiguous_in_view_order(
        (view, _) in view_strategy(),
        start in 1i64..30,
        len in 0i64..10,
    ) {
        let ranges = format!("{}-{}", start, start + len);
        let plan = resolve(&view, &SelectionMode::Ranges(ranges));
        prop_assert_eq!(plan.len(), 1);
        let positions: Vec<usize> = plan[0]
            .iter()
            .map(|p| view.pages().iter().position(|q| q == p).unwrap())
            .collect();
        for pair in positions.windows(2) {
            prop_assert_eq!(pair[1], pair[0] + 1);
        }
    }

    #[test]
    fn valid_syntax_always_resolves_one_group_per_token(
        (view, _) in view_strategy(),
        tokens in prop::collection::vec(
            prop_oneof![
                (1i64..40).prop_map(|p| p.to_string()),
                (1i64..40, 1i64..40).prop_map(|(a, b)| format!("{}-{}", a, b)),
            ],
            1..6,
        ),
    ) {
        let input = tokens.join(",");
        prop_assert_eq!(validate_range_syntax(&input), None);
        let plan = resolve(&view, &SelectionMode::Ranges(input));
        prop_assert_eq!(plan.len(), tokens.len());
    }

    #[test]
    fn range_plan_has_one_slot_per_token(
        (view, _) in view_strategy(),
        tokens in prop::collection::vec(range_token(), 1..6),
    ) {
        let readable = tokens.iter().any(|t| t.chars().all(|c| c.is_ascii_digit() || c == '-'));
        let plan = resolve(&view, &SelectionMode::Ranges(tokens.join(",")));
        if readable {
            prop_assert_eq!(plan.len(), tokens.len());
        } else {
            prop_assert!(plan.is_empty());
        }
    }

    #[test]
    fn extract_keeps_selection_order(
        (view, _) in view_strategy(),
        picks in prop::collection::vec(0usize..30, 1..10),
    ) {
        let plan = resolve(&view, &SelectionMode::Extract(picks.clone()));
        let expected: Vec<usize> = picks.iter().filter_map(|&p| view.get(p)).collect();
        prop_assert_eq!(plan, vec![expected]);
    }

    #[test]
    fn delete_and_extract_partition_the_view(
        (view, _) in view_strategy(),
        picks in prop::collection::hash_set(0usize..30, 1..10),
    ) {
        let picks: Vec<usize> = picks.into_iter().filter(|&p| p < view.len()).collect();
        prop_assume!(!picks.is_empty());
        let mut sorted = picks.clone();
        sorted.sort_unstable();

        let kept = resolve(&view, &SelectionMode::Delete(picks.clone())).remove(0);
        let removed = resolve(&view, &SelectionMode::Extract(sorted)).remove(0);

        prop_assert_eq!(kept.len() + removed.len(), view.len());
        let kept_set: HashSet<usize> = kept.iter().copied().collect();
        prop_assert!(removed.iter().all(|p| !kept_set.contains(p)));
    }

    #[test]
    fn resolving_is_repeatable((view, _) in view_strategy(), ranges in range_string()) {
        let mode = SelectionMode::Ranges(ranges);
        prop_assert_eq!(resolve(&view, &mode), resolve(&view, &mode));
    }

    #[test]
    fn deleting_everything_is_rejected((view, _) in view_strategy()) {
        let everything: Vec<usize> = (0..view.len()).collect();
        prop_assert!(validate_selection(&view, &SelectionMode::Delete(everything)).is_err());
    }

    // ============================================================
    // Placement Tests
    // ============================================================

    #[test]
    fn placement_centres_the_box_on_the_anchor(
        width in 100.0f64..2000.0,
        height in 100.0f64..2000.0,
        ax in 0.0f64..=1.0,
        ay in 0.0f64..=1.0,
        rotation in -360.0f64..360.0,
        ew in 0.0f64..500.0,
        eh in 0.0f64..200.0,
    ) {
        let page = PageSize { width, height };
        let anchor = Anchor { x: ax, y: ay };
        let extent = TextExtent { width: ew, height: eh };
        let origin = place(page, anchor, rotation, extent);
        let center = visual_center(origin, rotation, extent);
        let target = anchor_point(page, anchor);
        prop_assert!((center.x - target.x).abs() < 1e-6);
        prop_assert!((center.y - target.y).abs() < 1e-6);
    }

    // ============================================================
    // Template Tests
    // ============================================================

    #[test]
    fn rendered_text_has_no_placeholders_left(
        prefix in "[A-Za-z ]{0,10}",
        width in 1usize..8,
        index in 0usize..500,
        extra in 0usize..500,
    ) {
        let total = index + 1 + extra;
        let template = format!("{}{{page}}/{{total}} {{page:{}}}", prefix, width);
        let text = render_page_text(&template, index, total);
        prop_assert!(!text.contains('{'), "placeholder left in {:?}", text);
        let padded = text.rsplit(' ').next().unwrap();
        prop_assert!(padded.len() >= width);
        prop_assert_eq!(padded.parse::<usize>().unwrap(), index + 1);
    }

    #[test]
    fn text_without_braces_is_unchanged(text in "[^{}]{0,40}", index in 0usize..50) {
        prop_assert_eq!(render_page_text(&text, index, 50), text);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    // ============================================================
    // Document Tests
    // ============================================================

    #[test]
    fn four_quarter_turns_restore_rotation(count in 1usize..5, page in 0usize..5) {
        prop_assume!(page < count);
        let mut pdf = pdf_with_pages(count);
        let spec = RotateSpec { degrees: 90, pages: PageTarget::Only(vec![page]) };
        for _ in 0..4 {
            pdf = rotate_pages(&pdf, &spec).unwrap();
        }
        prop_assert!(rotations(&pdf).iter().all(|&r| r == 0));
    }

    #[test]
    fn assembled_page_count_matches_request(
        count in 1usize..6,
        picks in prop::collection::vec(0usize..6, 1..8),
    ) {
        let picks: Vec<usize> = picks.into_iter().filter(|&p| p < count).collect();
        prop_assume!(!picks.is_empty());
        let out = assemble_pages(&pdf_with_pages(count), &picks).unwrap();
        let doc = Document::load_mem(&out).unwrap();
        prop_assert_eq!(doc.get_pages().len(), picks.len());
    }
}
