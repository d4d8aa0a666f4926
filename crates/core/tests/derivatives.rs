use image::{DynamicImage, ImageOutputFormat, RgbImage};
use inventory_core::images::{DerivativeCache, ImageUpload};
use inventory_core::models::{Item, ItemId};
use inventory_core::{Catalog, CoreError};
use std::io::Cursor;
use storage::{connect, migrate};
use tempfile::tempdir;

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([90, 120, 200])));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageOutputFormat::Png).unwrap();
    out.into_inner()
}

fn dimensions(path: &std::path::Path) -> (u32, u32) {
    image::image_dimensions(path).unwrap()
}

const ITEM: ItemId = ItemId(7);

#[tokio::test]
async fn upload_warms_small_derivatives() {
    let temp = tempdir().unwrap();
    let cache = DerivativeCache::new(temp.path());

    let stored = cache
        .store(ITEM, vec![ImageUpload::new("photo.png", png(400, 300))])
        .await
        .unwrap();
    assert_eq!(stored, vec!["photo.png"]);
    assert_eq!(cache.generated(), 2);

    let dir = cache.item_dir(ITEM);
    assert_eq!(dimensions(&dir.join("photow200.png")), (200, 150));
    assert_eq!(dimensions(&dir.join("photow200h200.png")), (200, 200));
    assert_eq!(cache.list_originals(ITEM).await.unwrap(), vec!["photo.png"]);
}

#[tokio::test]
async fn resolve_generates_once_then_reuses() {
    let temp = tempdir().unwrap();
    let cache = DerivativeCache::new(temp.path());
    cache
        .store(ITEM, vec![ImageUpload::new("photo.png", png(400, 300))])
        .await
        .unwrap();
    let warmed = cache.generated();

    let target = cache.item_dir(ITEM).join("photow320.png");
    assert!(!target.exists());
    let path = cache
        .resolve(ITEM, "photo.png", Some(320), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(path, target);
    assert!(path.exists());
    assert_eq!(dimensions(&path), (320, 240));
    assert_eq!(cache.generated(), warmed + 1);

    let again = cache
        .resolve(ITEM, "photo.png", Some(320), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(again, path);
    assert_eq!(cache.generated(), warmed + 1);

    let cropped = cache
        .resolve(ITEM, "photo.png", Some(64), Some(48))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(dimensions(&cropped), (64, 48));

    // no width means the original, whatever the height
    let original = cache
        .resolve(ITEM, "photo.png", None, Some(48))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(original, cache.item_dir(ITEM).join("photo.png"));

    // derivatives never show up as originals, neither do temp files
    std::fs::write(cache.item_dir(ITEM).join(".photow1.png.1-1.tmp"), b"x").unwrap();
    assert_eq!(cache.list_originals(ITEM).await.unwrap(), vec!["photo.png"]);
}

#[tokio::test]
async fn missing_originals_resolve_to_none() {
    let temp = tempdir().unwrap();
    let cache = DerivativeCache::new(temp.path());
    assert!(cache.resolve(ITEM, "nothing.png", Some(200), None).await.unwrap().is_none());
    assert!(cache.resolve(ITEM, "nothing.png", None, None).await.unwrap().is_none());
    assert!(cache.list_originals(ITEM).await.unwrap().is_empty());
    assert_eq!(cache.generated(), 0);
}

#[tokio::test]
async fn delete_all_clears_the_item_directory() {
    let temp = tempdir().unwrap();
    let cache = DerivativeCache::new(temp.path());
    cache
        .store(
            ITEM,
            vec![
                ImageUpload::new("front.png", png(50, 50)),
                ImageUpload::new("back.png", png(60, 40)),
            ],
        )
        .await
        .unwrap();
    assert_eq!(cache.list_originals(ITEM).await.unwrap(), vec!["back.png", "front.png"]);

    cache.delete_all(ITEM).await.unwrap();
    assert!(!cache.item_dir(ITEM).exists());
    assert!(cache.resolve(ITEM, "front.png", Some(200), None).await.unwrap().is_none());
    // already gone is fine
    cache.delete_all(ITEM).await.unwrap();
}

#[tokio::test]
async fn delete_one_removes_every_derivative_of_that_original() {
    let temp = tempdir().unwrap();
    let cache = DerivativeCache::new(temp.path());
    cache
        .store(
            ITEM,
            vec![
                ImageUpload::new("front.png", png(80, 80)),
                ImageUpload::new("back.png", png(80, 80)),
            ],
        )
        .await
        .unwrap();
    cache.resolve(ITEM, "front.png", Some(40), Some(10)).await.unwrap();

    // original + two warmed + one on demand
    assert_eq!(cache.delete_one(ITEM, "front.png").await.unwrap(), 4);

    let mut left: Vec<String> = std::fs::read_dir(cache.item_dir(ITEM))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    left.sort();
    assert_eq!(left, vec!["back.png", "backw200.png", "backw200h200.png"]);
}

#[tokio::test]
async fn ambiguous_filenames_are_rejected_before_writing() {
    let temp = tempdir().unwrap();
    let cache = DerivativeCache::new(temp.path());
    for bad in ["archive.tar.png", "../escape.png", "photow200.png", "noext"] {
        let err = cache
            .store(
                ITEM,
                vec![
                    ImageUpload::new("fine.png", png(10, 10)),
                    ImageUpload::new(bad, png(10, 10)),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidFilename { .. }), "{bad}");
    }
    assert!(!cache.item_dir(ITEM).exists());
}

#[tokio::test]
async fn generated_upload_names_sniff_the_format() {
    let upload = ImageUpload::generated(png(4, 4), 3);
    assert!(upload.filename.ends_with("i3.png"), "{}", upload.filename);
    let unknown = ImageUpload::generated(b"plain text".to_vec(), 0);
    assert!(unknown.filename.ends_with("i0.bin"));
}

#[tokio::test]
async fn catalog_image_use_cases_need_a_live_item() {
    let temp = tempdir().unwrap();
    let pool = connect(&temp.path().join("inventory.db").to_string_lossy())
        .await
        .unwrap();
    migrate(&pool).await.unwrap();
    let catalog = Catalog::new(pool, DerivativeCache::new(temp.path().join("images")));

    let missing = ItemId(99);
    assert!(matches!(
        catalog.item_images(missing).await,
        Err(CoreError::ItemNotFound(_))
    ));

    let mut item = Item::new("Camera").with_types(["optics"]);
    catalog.save_item(&mut item).await.unwrap();
    let id = item.id.unwrap();
    catalog
        .upload_images(id, vec![ImageUpload::new("lens.png", png(300, 200))])
        .await
        .unwrap();

    let path = catalog.image_path(id, "lens.png", Some(150), None).await.unwrap().unwrap();
    assert_eq!(dimensions(&path), (150, 100));

    let tags = catalog.top_tags(inventory_core::models::Category::Type).await.unwrap();
    let covers = catalog
        .tag_cover_images(&tags)
        .await
        .unwrap();
    assert_eq!(covers.len(), 1);
    assert_eq!(covers[0].item, id);
    assert_eq!(covers[0].filename, "lens.png");

    catalog.archive_item(id).await.unwrap();
    assert!(!catalog.images().item_dir(id).exists());
    assert!(catalog.image_path(id, "lens.png", None, None).await.unwrap().is_none());

    catalog.delete_item(id).await.unwrap();
    assert!(matches!(
        catalog.delete_image(id, "lens.png").await,
        Err(CoreError::ItemNotFound(_))
    ));
}

#[tokio::test]
async fn saving_into_archived_or_deleted_state_drops_images() {
    let temp = tempdir().unwrap();
    let pool = connect(&temp.path().join("inventory.db").to_string_lossy())
        .await
        .unwrap();
    migrate(&pool).await.unwrap();
    let catalog = Catalog::new(pool, DerivativeCache::new(temp.path().join("images")));

    for flag in ["archived", "deleted"] {
        let mut item = Item::new("Camera").with_types(["optics"]);
        catalog.save_item(&mut item).await.unwrap();
        let id = item.id.unwrap();
        catalog
            .upload_images(id, vec![ImageUpload::new("lens.png", png(40, 40))])
            .await
            .unwrap();

        match flag {
            "archived" => item.archived = true,
            _ => item.deleted = true,
        }
        let changes = catalog.save_item(&mut item).await.unwrap();
        assert_eq!(changes.types.deleted, vec!["optics".to_string()], "{flag}");
        assert!(!catalog.images().item_dir(id).exists(), "{flag}");
    }
}

#[tokio::test]
async fn oversized_requests_are_rejected() {
    let temp = tempdir().unwrap();
    let cache = DerivativeCache::new(temp.path()).with_max_side(500);
    cache
        .store(ITEM, vec![ImageUpload::new("photo.png", png(40, 30))])
        .await
        .unwrap();
    let warmed = cache.generated();

    for (w, h) in [(Some(100_000), None), (Some(100), Some(501))] {
        let err = cache.resolve(ITEM, "photo.png", w, h).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
    assert_eq!(cache.generated(), warmed);
    assert!(cache.resolve(ITEM, "photo.png", Some(500), None).await.unwrap().is_some());
}
