/// A shop seeded by name; the location is only used when the shop is created.
#[derive(Debug, Clone, Copy)]
pub struct ShopSeed {
    pub name: &'static str,
    pub location: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct ToySeed {
    pub name: &'static str,
    pub price: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct BrandSeed {
    pub name: &'static str,
    pub toys: &'static [ToySeed],
}

/// A brand/toy pair seeded a second time near the end of a run
#[derive(Debug, Clone, Copy)]
pub struct ReseedToy {
    pub brand: &'static str,
    pub toy: ToySeed,
}

const fn toy(name: &'static str, price: f64) -> ToySeed {
    ToySeed { name, price }
}

pub const SHOPS: &[ShopSeed] = &[
    ShopSeed {
        name: "Toys R Us",
        location: "New York",
    },
    ShopSeed {
        name: "Hamleys",
        location: "London",
    },
    ShopSeed {
        name: "KidZone",
        location: "Tokyo",
    },
];

pub const CATALOG: &[BrandSeed] = &[
    BrandSeed {
        name: "Lego",
        toys: &[
            toy("Lego Car", 19.99),
            toy("Lego Train", 59.99),
            toy("Lego Plane", 39.99),
            toy("Lego House", 49.99),
        ],
    },
    BrandSeed {
        name: "Hasbro",
        toys: &[
            toy("Nerf Gun", 29.99),
            toy("Action Figure", 15.49),
            toy("Transformers Bot", 45.99),
        ],
    },
    BrandSeed {
        name: "Mattel",
        toys: &[
            toy("Barbie Doll", 24.99),
            toy("Hot Wheels Car", 5.99),
            toy("Uno Cards", 9.99),
            toy("Fisher Price Blocks", 14.99),
        ],
    },
    BrandSeed {
        name: "Bandai",
        toys: &[
            toy("Gundam Model Kit", 34.99),
            toy("Power Rangers Sword", 27.99),
        ],
    },
    BrandSeed {
        name: "Spin Master",
        toys: &[
            toy("Bakugan Toy", 19.49),
            toy("PAW Patrol Car", 22.99),
            toy("Kinetic Sand Set", 17.99),
        ],
    },
    BrandSeed {
        name: "Funko",
        toys: &[
            toy("Funko Pop Ironman", 12.99),
            toy("Funko Pop Batman", 12.99),
            toy("Funko Pop Stranger Things", 12.99),
        ],
    },
];

/// Prices here differ from the catalog for existing keys and are never applied to them.
pub const RESEED: &[ReseedToy] = &[
    ReseedToy {
        brand: "Lego",
        toy: toy("Lego Car", 19.99),
    },
    ReseedToy {
        brand: "Hasbro",
        toy: toy("Action Figure", 25.99),
    },
    ReseedToy {
        brand: "Hasbro",
        toy: toy("Nerf Gun", 39.99),
    },
    ReseedToy {
        brand: "Lego",
        toy: toy("Lego Helicopter", 49.99),
    },
    ReseedToy {
        brand: "Lego",
        toy: toy("Lego Train", 59.99),
    },
];

pub const FEATURED_SHOP: &str = "Toys R Us";
pub const FEATURED_TOYS: &[&str] = &["Lego Car", "Lego Train"];

pub const MANUAL_TOY_NAME: &str = "Lego Car";
pub const LEGO_CAR_INSTRUCTIONS: &str = "Step 1: Open box\nStep 2: Sort bricks\nStep 3: Build car 🚗";

pub const LEGO: &str = "Lego";
pub const SPIN_MASTER: &str = "Spin Master";
pub const KINETIC_SAND_SET: &str = "Kinetic Sand Set";

/// Toy seeded without a brand so it can be assigned to [`LEGO`]
pub const UNASSIGNED_TOY: &str = "Lego Set";

pub fn default_manual(toy_name: &str) -> String {
    format!(
        "This is the user manual for {}. Follow the steps to enjoy your toy!",
        toy_name
    )
}
