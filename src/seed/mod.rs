//! Idempotent seeding of the toy catalog.
//!
//! Every record is created through find-or-create, so running the seed twice
//! leaves the row counts unchanged. Steps that read records seeded by the
//! catalog run after it.

pub mod data;
pub mod report;

pub use report::*;

use crate::error::SeedError;
use crate::model::{
    Brand, Filter, Manual, Record, Shop, Toy, BRAND_TOYS, SHOP_TOYS, TOY_MANUAL,
};
use crate::row;
use crate::store::{typed, Store};
use anyhow::Result;
use data::*;

/// Run every seed step in order against `store`.
pub async fn run_seed<S: Store + ?Sized>(store: &S) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    seed_shops(store, &mut report).await?;
    seed_catalog(store).await?;
    reseed_toys(store, &mut report).await?;
    seed_unassigned_toy(store).await?;

    stock_featured_shop(store, &mut report).await?;
    seed_lego_car_manual(store, &mut report).await?;
    seed_default_manuals(store, &mut report).await?;
    report_lego_toys(store, &mut report).await?;
    check_spin_master(store, &mut report).await?;
    assign_unassigned_toy(store, &mut report).await?;
    report_final_state(store, &mut report).await?;

    for entity in &store.schema().entities {
        let count = store.count(&entity.name, &Filter::new()).await?;
        report.row_counts.insert(entity.table.clone(), count);
    }
    log::info!("🌱 {}", report.summary());

    Ok(report)
}

async fn require<T: Record, S: Store + ?Sized>(store: &S, filter: Filter, key: &str) -> Result<T> {
    match typed::find_one::<T, _>(store, &filter).await? {
        Some(record) => Ok(record),
        None => Err(SeedError::missing(T::ENTITY, key).into()),
    }
}

async fn find_brand<S: Store + ?Sized>(store: &S, name: &str) -> Result<Brand> {
    require(store, Filter::new().eq("name", name), name).await
}

async fn seed_shops<S: Store + ?Sized>(store: &S, report: &mut SeedReport) -> Result<()> {
    for seed in SHOPS {
        let (shop, created) = typed::find_or_create::<Shop, _>(
            store,
            row! { "name" => seed.name },
            row! { "location" => seed.location },
        )
        .await?;
        if created {
            log::info!("🏬 Created shop {}", shop.name);
        }
        report.shops.push(shop);
    }
    Ok(())
}

/// Upsert each brand, then its toys keyed by (name, BrandId). Prices only
/// apply to newly created toys.
async fn seed_catalog<S: Store + ?Sized>(store: &S) -> Result<()> {
    for brand_seed in CATALOG {
        let (brand, _) =
            typed::find_or_create::<Brand, _>(store, row! { "name" => brand_seed.name }, row! {})
                .await?;

        for toy_seed in brand_seed.toys {
            let (toy, created) = typed::find_or_create::<Toy, _>(
                store,
                row! { "name" => toy_seed.name, "BrandId" => brand.id },
                row! { "price" => toy_seed.price },
            )
            .await?;
            if created {
                log::debug!("Created {} {}", brand.name, toy.name);
            }
        }
    }
    log::info!("🧸 Catalog of {} brands seeded", CATALOG.len());
    Ok(())
}

async fn reseed_toys<S: Store + ?Sized>(store: &S, report: &mut SeedReport) -> Result<()> {
    for reseed in RESEED {
        let (brand, _) =
            typed::find_or_create::<Brand, _>(store, row! { "name" => reseed.brand }, row! {})
                .await?;
        let (toy, created) = typed::find_or_create::<Toy, _>(
            store,
            row! { "name" => reseed.toy.name, "BrandId" => brand.id },
            row! { "price" => reseed.toy.price },
        )
        .await?;
        log::info!(
            "✅ Toy {}: {}, Brand: {} ({})",
            if created { "added" } else { "found" },
            toy.name,
            brand.name,
            toy.display_price()
        );
        report.reseeded.push((toy.name, created));
    }
    Ok(())
}

/// Keyed by name alone: once assigned to a brand the toy is found, not recreated.
async fn seed_unassigned_toy<S: Store + ?Sized>(store: &S) -> Result<()> {
    let (toy, created) =
        typed::find_or_create::<Toy, _>(store, row! { "name" => UNASSIGNED_TOY }, row! {}).await?;
    if created {
        log::info!("🧩 Created unassigned toy {}", toy.name);
    }
    Ok(())
}

async fn stock_featured_shop<S: Store + ?Sized>(store: &S, report: &mut SeedReport) -> Result<()> {
    let shop: Shop = require(store, Filter::new().eq("name", FEATURED_SHOP), FEATURED_SHOP).await?;
    let toys = typed::find_all::<Toy, _>(
        store,
        &Filter::new().any_of("name", FEATURED_TOYS.iter().copied()),
    )
    .await?;
    SHOP_TOYS.add_all(store, &shop, &toys).await?;

    let inventory = SHOP_TOYS.get(store, &shop).await?;
    log::info!("🏬 Toys available at {}:\n{}", shop.name, toy_lines(&inventory));
    report.shop_inventory = inventory;
    Ok(())
}

async fn seed_lego_car_manual<S: Store + ?Sized>(store: &S, report: &mut SeedReport) -> Result<()> {
    let toy: Toy = require(store, Filter::new().eq("name", MANUAL_TOY_NAME), MANUAL_TOY_NAME).await?;
    typed::find_or_create::<Manual, _>(
        store,
        row! { "ToyId" => toy.id },
        row! { "instructions" => LEGO_CAR_INSTRUCTIONS },
    )
    .await?;

    let manual = TOY_MANUAL
        .get_one(store, &toy)
        .await?
        .ok_or_else(|| SeedError::missing(Manual::ENTITY, format!("ToyId {}", toy.id)))?;
    let instructions = manual.instructions.unwrap_or_default();
    log::info!("📘 Manual for {}:\n{}", toy.name, instructions);
    report.lego_car_manual = Some(instructions);
    Ok(())
}

async fn seed_default_manuals<S: Store + ?Sized>(store: &S, report: &mut SeedReport) -> Result<()> {
    for toy in typed::find_all::<Toy, _>(store, &Filter::new()).await? {
        if TOY_MANUAL.count(store, &toy).await? > 0 {
            log::info!("✅ {} already has a manual", toy.name);
            report.manuals_existing.push(toy.name);
            continue;
        }
        typed::find_or_create::<Manual, _>(
            store,
            row! { "ToyId" => toy.id },
            row! { "instructions" => default_manual(&toy.name) },
        )
        .await?;
        log::info!("📘 Created manual for {}", toy.name);
        report.manuals_created.push(toy.name);
    }
    Ok(())
}

async fn report_lego_toys<S: Store + ?Sized>(store: &S, report: &mut SeedReport) -> Result<()> {
    let lego = find_brand(store, LEGO).await?;
    let toys = BRAND_TOYS.get(store, &lego).await?;
    log::info!("🧸 Toys made by LEGO:\n{}", toy_lines(&toys));

    let count = BRAND_TOYS.count(store, &lego).await?;
    log::info!("🧮 LEGO has {} toys.", count);
    if count != toys.len() as i64 {
        return Err(SeedError::CountMismatch {
            relation: BRAND_TOYS.name().to_string(),
            counted: count,
            fetched: toys.len(),
        }
        .into());
    }

    report.lego_toys = toys;
    report.lego_toy_count = count;
    Ok(())
}

async fn check_spin_master<S: Store + ?Sized>(store: &S, report: &mut SeedReport) -> Result<()> {
    let spin_master = find_brand(store, SPIN_MASTER).await?;
    let kinetic_sand: Toy =
        require(store, Filter::new().eq("name", KINETIC_SAND_SET), KINETIC_SAND_SET).await?;

    let has = BRAND_TOYS.has(store, &spin_master, &kinetic_sand).await?;
    log::info!(
        "🤔 Does {} have {}? {}",
        spin_master.name,
        kinetic_sand.name,
        if has { "Yes" } else { "No" }
    );
    report.spin_master_has_kinetic_sand = has;
    Ok(())
}

async fn assign_unassigned_toy<S: Store + ?Sized>(store: &S, report: &mut SeedReport) -> Result<()> {
    let unassigned = typed::find_one::<Toy, _>(
        store,
        &Filter::new().eq("name", UNASSIGNED_TOY).is_null("BrandId"),
    )
    .await?;
    let Some(toy) = unassigned else {
        log::info!("✅ No unassigned '{}' left to assign", UNASSIGNED_TOY);
        return Ok(());
    };

    let lego = find_brand(store, LEGO).await?;
    BRAND_TOYS.add(store, &lego, &toy).await?;
    let assigned = BRAND_TOYS.has(store, &lego, &toy).await?;
    log::info!(
        "✅ Was '{}' successfully assigned to LEGO? {}",
        toy.name,
        if assigned { "Yes" } else { "No" }
    );
    report.lego_set_assigned = Some(assigned);
    Ok(())
}

async fn report_final_state<S: Store + ?Sized>(store: &S, report: &mut SeedReport) -> Result<()> {
    for toy in typed::find_all::<Toy, _>(store, &Filter::new()).await? {
        let has_manual = TOY_MANUAL.get_one(store, &toy).await?.is_some();
        if has_manual {
            log::info!("✅ {} has a manual.", toy.name);
        } else {
            log::info!("❌ {} has no manual.", toy.name);
        }
        report.manual_presence.push((toy.name, has_manual));
    }

    let (brand, toys) = BRAND_TOYS
        .find_with(store, &Filter::new().eq("name", LEGO))
        .await?
        .ok_or_else(|| SeedError::missing(Brand::ENTITY, LEGO))?;
    log::info!("📦 Brand: {}\n{}", brand.name, toy_lines(&toys));
    report.eager_brand = brand.name;
    report.eager_toys = toys;
    Ok(())
}
