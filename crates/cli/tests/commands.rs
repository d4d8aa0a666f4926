use cli::commands;
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use inventory_core::config::{AppConfig, DatabaseConfig, ImageConfig, TagConfig};
use inventory_core::models::Category;
use inventory_core::Catalog;
use std::fs;
use std::io::Cursor;
use tempfile::tempdir;

fn test_config(root: &std::path::Path) -> AppConfig {
    AppConfig {
        database: DatabaseConfig {
            path: root.join("db").join("inventory.db").to_string_lossy().into_owned(),
        },
        images: ImageConfig {
            base_path: root.join("images").to_string_lossy().into_owned(),
            small_width: 100,
            small_height: 100,
            max_side: 1000,
        },
        tags: TagConfig { top_n: 2 },
    }
}

#[tokio::test]
async fn add_archive_and_list_tags() {
    let temp = tempdir().unwrap();
    let catalog = Catalog::open(&test_config(temp.path())).await.unwrap();
    assert!(temp.path().join("images").is_dir());

    let tools = vec!["tool".to_string()];
    let garage = vec!["garage".to_string()];
    let a = commands::add_item(&catalog, "Hammer", &tools, &garage, None).await.unwrap();
    commands::add_item(&catalog, "Wrench", &tools, &[], Some("Bahco".into()))
        .await
        .unwrap();
    commands::add_item(&catalog, "Level", &["measure".to_string()], &garage, None)
        .await
        .unwrap();

    let tags = commands::list_tags(&catalog, Some("types"), "count").await.unwrap();
    let counts: Vec<(String, i64)> = tags.into_iter().map(|t| (t.name, t.count)).collect();
    assert_eq!(counts, vec![("tool".into(), 2), ("measure".into(), 1)]);

    catalog.archive_item(a.id.unwrap()).await.unwrap();
    let top = commands::top_tags(&catalog, "location").await.unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].category, Category::Location);
    assert_eq!(top[0].count, 1);

    let archived = commands::list_items(&catalog, true, None).await.unwrap();
    assert_eq!(archived.len(), 1);
    let found = commands::list_items(&catalog, false, Some("bahco")).await.unwrap();
    assert_eq!(found[0].name, "Wrench");
}

#[tokio::test]
async fn invalid_input_is_rejected_at_the_boundary() {
    let temp = tempdir().unwrap();
    let catalog = Catalog::open(&test_config(temp.path())).await.unwrap();
    assert!(commands::add_item(&catalog, "Hammer", &["a b".to_string()], &[], None)
        .await
        .is_err());
    assert!(commands::list_tags(&catalog, Some("colour"), "count").await.is_err());
    assert!(commands::list_tags(&catalog, None, "size").await.is_err());
    assert!(catalog.tags().list(None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn upload_then_resolve_from_disk() {
    let temp = tempdir().unwrap();
    let catalog = Catalog::open(&test_config(temp.path())).await.unwrap();
    let item = commands::add_item(&catalog, "Camera", &[], &[], None).await.unwrap();
    let id = item.id.unwrap();

    let src = temp.path().join("shot.png");
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(200, 100))
        .write_to(&mut bytes, ImageOutputFormat::Png)
        .unwrap();
    fs::write(&src, bytes.into_inner()).unwrap();

    let stored = commands::upload(&catalog, id, &[src.clone()], false).await.unwrap();
    assert_eq!(stored, vec!["shot.png"]);
    let renamed = commands::upload(&catalog, id, &[src], true).await.unwrap();
    assert!(renamed[0].ends_with("i0.png"));

    let path = commands::image_path(&catalog, id, "shot.png", Some(100), None)
        .await
        .unwrap();
    assert_eq!(image::image_dimensions(&path).unwrap(), (100, 50));
    assert!(commands::image_path(&catalog, id, "gone.png", Some(100), None)
        .await
        .is_err());
    assert!(commands::image_path(&catalog, id, "shot.png", Some(100_000), None)
        .await
        .is_err());
    assert_eq!(catalog.item_images(id).await.unwrap().len(), 2);
}
