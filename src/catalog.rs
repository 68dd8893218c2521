/// Static marketing catalog of listed properties. The database is the source
/// of truth for operational records; this catalog mirrors the published
/// listings so pricing can resolve without a DB round-trip.
#[derive(Debug, Clone, Copy)]
pub struct CatalogProperty {
    pub external_id: &'static str,
    pub name: &'static str,
    pub location: &'static str,
    pub price_monthly: f64,
}

pub static CATALOG: &[CatalogProperty] = &[
    CatalogProperty {
        external_id: "villa-serena",
        name: "Villa Serena",
        location: "Marbella, Golden Mile",
        price_monthly: 8500.0,
    },
    CatalogProperty {
        external_id: "penthouse-azul",
        name: "Penthouse Azul",
        location: "Puerto Banus Marina",
        price_monthly: 6200.0,
    },
    CatalogProperty {
        external_id: "casa-del-mar",
        name: "Casa del Mar",
        location: "Estepona, New Golden Mile",
        price_monthly: 4800.0,
    },
    CatalogProperty {
        external_id: "atico-la-cala",
        name: "Atico La Cala",
        location: "Mijas Costa",
        price_monthly: 3000.0,
    },
    CatalogProperty {
        external_id: "finca-las-brisas",
        name: "Finca Las Brisas",
        location: "Benahavis Hills",
        price_monthly: 11000.0,
    },
];

pub fn find_by_external_id(external_id: &str) -> Option<&'static CatalogProperty> {
    let needle = external_id.trim();
    if needle.is_empty() {
        return None;
    }
    CATALOG
        .iter()
        .find(|property| property.external_id.eq_ignore_ascii_case(needle))
}
