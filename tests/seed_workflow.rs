use std::collections::BTreeSet;

use serde_json::json;
use toyshop_seed::store::{typed, RecordStore, SchemaStore, Store};
use toyshop_seed::{
    catalog_schema, row, run_seed, sync_and_seed, Brand, Filter, Manual, MemoryStore, Shop, Toy,
    BRAND_TOYS, SHOP_TOYS, TOY_MANUAL, TOY_SHOPS,
};

async fn synced_store() -> MemoryStore {
    let store = MemoryStore::new(catalog_schema().unwrap());
    store.sync().await.unwrap();
    store
}

async fn find_toy(store: &MemoryStore, name: &str, brand: &str) -> Toy {
    let brand: Brand = typed::find_one(store, &Filter::new().eq("name", brand))
        .await
        .unwrap()
        .unwrap();
    typed::find_one(
        store,
        &Filter::new().eq("name", name).eq("BrandId", brand.id),
    )
    .await
    .unwrap()
    .unwrap()
}

#[tokio::test]
async fn test_seed_twice_keeps_row_counts() {
    let store = synced_store().await;

    let first = run_seed(&store).await.unwrap();
    let second = run_seed(&store).await.unwrap();

    assert_eq!(first.row_counts, second.row_counts);
    assert_eq!(first.row_counts["Brands"], 6);
    assert_eq!(first.row_counts["Shops"], 3);
    // 19 catalog toys, Lego Helicopter and Lego Set
    assert_eq!(first.row_counts["Toys"], 21);
    assert_eq!(first.row_counts["Manuals"], 21);
    assert_eq!(first.row_counts["ShopToys"], 2);

    assert!(second.reseeded.iter().all(|(_, created)| !created));
    assert!(second.manuals_created.is_empty());
    assert_eq!(second.lego_set_assigned, None);
}

#[tokio::test]
async fn test_first_run_reports() {
    let store = synced_store().await;
    let report = run_seed(&store).await.unwrap();

    let reseeded: Vec<(&str, bool)> = report
        .reseeded
        .iter()
        .map(|(name, created)| (name.as_str(), *created))
        .collect();
    assert_eq!(
        reseeded,
        vec![
            ("Lego Car", false),
            ("Action Figure", false),
            ("Nerf Gun", false),
            ("Lego Helicopter", true),
            ("Lego Train", false),
        ]
    );

    assert_eq!(
        report.lego_car_manual.as_deref(),
        Some("Step 1: Open box\nStep 2: Sort bricks\nStep 3: Build car 🚗")
    );
    assert!(report.spin_master_has_kinetic_sand);
    assert_eq!(report.lego_set_assigned, Some(true));
    assert_eq!(report.lego_toy_count, report.lego_toys.len() as i64);
    assert!(report.toys_without_manual().is_empty());
    assert_eq!(report.eager_brand, "Lego");

    let eager: BTreeSet<&str> = report.eager_toys.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(
        eager,
        BTreeSet::from([
            "Lego Car",
            "Lego Train",
            "Lego Plane",
            "Lego House",
            "Lego Helicopter",
            "Lego Set",
        ])
    );
}

#[tokio::test]
async fn test_referential_integrity_after_seed() {
    let store = synced_store().await;
    run_seed(&store).await.unwrap();

    let brand_ids: BTreeSet<i64> = typed::find_all::<Brand, _>(&store, &Filter::new())
        .await
        .unwrap()
        .iter()
        .map(|b| b.id)
        .collect();
    let toys: Vec<Toy> = typed::find_all(&store, &Filter::new()).await.unwrap();
    for toy in &toys {
        if let Some(brand_id) = toy.brand_id {
            assert!(brand_ids.contains(&brand_id), "{}", toy.name);
        }
    }

    let toy_ids: BTreeSet<i64> = toys.iter().map(|t| t.id).collect();
    let manuals: Vec<Manual> = typed::find_all(&store, &Filter::new()).await.unwrap();
    let mut manual_toys = BTreeSet::new();
    for manual in &manuals {
        let toy_id = manual.toy_id.unwrap();
        assert!(toy_ids.contains(&toy_id));
        assert!(manual_toys.insert(toy_id), "two manuals for toy {}", toy_id);
    }
}

#[tokio::test]
async fn test_shop_toy_pairs_are_unique() {
    let store = synced_store().await;
    run_seed(&store).await.unwrap();
    run_seed(&store).await.unwrap();

    let pairs: Vec<(i64, i64)> = store
        .rows("ShopToys")
        .unwrap()
        .iter()
        .map(|r| (r["ShopId"].as_i64().unwrap(), r["ToyId"].as_i64().unwrap()))
        .collect();
    let unique: BTreeSet<(i64, i64)> = pairs.iter().copied().collect();
    assert_eq!(pairs.len(), unique.len());
}

#[tokio::test]
async fn test_count_matches_fetched_for_every_brand() {
    let store = synced_store().await;
    run_seed(&store).await.unwrap();

    for brand in typed::find_all::<Brand, _>(&store, &Filter::new()).await.unwrap() {
        let toys = BRAND_TOYS.get(&store, &brand).await.unwrap();
        let count = BRAND_TOYS.count(&store, &brand).await.unwrap();
        assert_eq!(count, toys.len() as i64, "{}", brand.name);
    }
}

#[tokio::test]
async fn test_category_default_and_explicit() {
    let store = synced_store().await;

    let plain: Toy = typed::create(&store, row! { "name" => "Kite" }).await.unwrap();
    let explicit: Toy = typed::create(&store, row! { "name" => "Ball", "category" => "sport" })
        .await
        .unwrap();

    assert_eq!(plain.category, "fun");
    assert_eq!(explicit.category, "sport");
}

#[tokio::test]
async fn test_lego_car_price_is_never_overwritten() {
    let store = synced_store().await;
    run_seed(&store).await.unwrap();

    let lego_car = find_toy(&store, "Lego Car", "Lego").await;
    assert_eq!(lego_car.price, Some(19.99));

    let (again, created) = typed::find_or_create::<Toy, _>(
        &store,
        row! { "name" => "Lego Car", "BrandId" => lego_car.brand_id.unwrap() },
        row! { "price" => 25.00 },
    )
    .await
    .unwrap();
    assert!(!created);
    assert_eq!(again.id, lego_car.id);
    assert_eq!(again.price, Some(19.99));

    // Re-seeded at 25.99 after the catalog created it at 15.49
    let action_figure = find_toy(&store, "Action Figure", "Hasbro").await;
    assert_eq!(action_figure.price, Some(15.49));
}

#[tokio::test]
async fn test_manual_find_or_create_does_not_duplicate() {
    let store = synced_store().await;
    let toy: Toy = typed::create(&store, row! { "name" => "Lego Car" }).await.unwrap();

    let (manual, created) = typed::find_or_create::<Manual, _>(
        &store,
        row! { "ToyId" => toy.id },
        row! { "instructions" => "Step 1..." },
    )
    .await
    .unwrap();
    assert!(created);

    let fetched = TOY_MANUAL.get_one(&store, &toy).await.unwrap().unwrap();
    assert_eq!(fetched.instructions.as_deref(), Some("Step 1..."));

    let (again, created) = typed::find_or_create::<Manual, _>(
        &store,
        row! { "ToyId" => toy.id },
        row! { "instructions" => "Something else" },
    )
    .await
    .unwrap();
    assert!(!created);
    assert_eq!(again.id, manual.id);
    assert_eq!(store.count("Manual", &Filter::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_toys_r_us_membership() {
    let store = synced_store().await;
    let report = run_seed(&store).await.unwrap();

    let inventory: BTreeSet<&str> = report
        .shop_inventory
        .iter()
        .map(|t| t.name.as_str())
        .collect();
    assert_eq!(inventory, BTreeSet::from(["Lego Car", "Lego Train"]));

    let shop: Shop = typed::find_one(&store, &Filter::new().eq("name", "Toys R Us"))
        .await
        .unwrap()
        .unwrap();
    for toy in &report.shop_inventory {
        assert!(SHOP_TOYS.has(&store, &shop, toy).await.unwrap());
        assert!(TOY_SHOPS.has(&store, toy, &shop).await.unwrap());
    }

    let hamleys: Shop = typed::find_one(&store, &Filter::new().eq("name", "Hamleys"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hamleys.location.as_deref(), Some("London"));
    assert_eq!(SHOP_TOYS.count(&store, &hamleys).await.unwrap(), 0);
}

#[tokio::test]
async fn test_existing_shop_location_is_kept() {
    let store = synced_store().await;
    store
        .create("Shop", row! { "name" => "KidZone", "location" => "Osaka" })
        .await
        .unwrap();

    run_seed(&store).await.unwrap();

    let kidzone = store
        .find_one("Shop", &Filter::new().eq("name", "KidZone"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(kidzone["location"], json!("Osaka"));
}

#[tokio::test]
async fn test_store_closed_after_success() {
    let store = MemoryStore::new(catalog_schema().unwrap());
    let report = sync_and_seed(&store).await.unwrap();
    assert!(report.total_rows() > 0);
    assert!(store.is_closed());
}

#[tokio::test]
async fn test_store_closed_after_failure() {
    let store = synced_store().await;
    store.close().await;

    // Every operation on a closed store fails, and close still runs once more
    let err = sync_and_seed(&store).await.unwrap_err();
    assert!(format!("{:#}", err).contains("closed"));
    assert!(store.is_closed());
}

#[tokio::test]
async fn test_seed_without_sync_fails() {
    let store = MemoryStore::new(catalog_schema().unwrap());
    let err = run_seed(&store).await.unwrap_err();
    assert!(err.to_string().contains("\"Shops\" does not exist"));
}
