//! Seed an empty database with demo data.
//!
//! Loads a few Lima distritos, a small catalog with opening stock, one
//! delivery zone with distance tiers and opening hours, a customer with a
//! credit line and an address, and a welcome coupon. Writes go through the
//! same repositories and services as the API, so seeded rows pass the same
//! validation.

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use sqlx::PgPool;
use tracing::info;

use tienda_api::db::{CategoriaRepository, ClienteRepository, DireccionRepository, ZonaRepository};
use tienda_api::models::catalogo::{CategoriaInput, ProductoInput};
use tienda_api::models::cliente::{ClienteInput, DireccionInput};
use tienda_api::models::reparto::ZonaInput;
use tienda_api::services::CatalogoService;
use tienda_core::DistritoId;

/// Distritos seeded under Lima / Lima: ubigeo and name.
const DISTRITOS: &[(&str, &str)] = &[
    ("150101", "Lima"),
    ("150104", "Barranco"),
    ("150122", "Miraflores"),
    ("150131", "San Isidro"),
    ("150140", "Santiago de Surco"),
];

/// Seed the database.
///
/// Does nothing when the catalog already has categories.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a write fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (_, pool) = super::connect().await?;

    let (poblada,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM categorias)")
        .fetch_one(&pool)
        .await?;
    if poblada {
        info!("Database already has data, skipping seed");
        return Ok(());
    }

    let distritos = seed_ubigeo(&pool).await?;
    seed_catalogo(&pool).await?;
    seed_reparto(&pool, &distritos).await?;
    seed_cliente(&pool, &distritos).await?;
    seed_cupon(&pool).await?;

    info!("Seeding complete!");
    Ok(())
}

fn input<T: DeserializeOwned>(value: Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(value)
}

/// Insert the Lima distritos and return their IDs in [`DISTRITOS`] order.
async fn seed_ubigeo(pool: &PgPool) -> Result<Vec<DistritoId>, Box<dyn std::error::Error>> {
    let (departamento_id,): (i32,) = sqlx::query_as(
        "INSERT INTO departamentos (ubigeo, nombre) VALUES ('15', 'Lima') \
         ON CONFLICT (ubigeo) DO UPDATE SET nombre = EXCLUDED.nombre RETURNING id",
    )
    .fetch_one(pool)
    .await?;

    let (provincia_id,): (i32,) = sqlx::query_as(
        "INSERT INTO provincias (departamento_id, ubigeo, nombre) VALUES ($1, '1501', 'Lima') \
         ON CONFLICT (ubigeo) DO UPDATE SET nombre = EXCLUDED.nombre RETURNING id",
    )
    .bind(departamento_id)
    .fetch_one(pool)
    .await?;

    let mut ids = Vec::with_capacity(DISTRITOS.len());
    for (ubigeo, nombre) in DISTRITOS {
        let (id,): (i32,) = sqlx::query_as(
            "INSERT INTO distritos (provincia_id, ubigeo, nombre) VALUES ($1, $2, $3) \
             ON CONFLICT (ubigeo) DO UPDATE SET nombre = EXCLUDED.nombre RETURNING id",
        )
        .bind(provincia_id)
        .bind(ubigeo)
        .bind(nombre)
        .fetch_one(pool)
        .await?;
        ids.push(DistritoId::new(id));
    }

    info!(distritos = ids.len(), "Ubigeo seeded");
    Ok(ids)
}

async fn seed_catalogo(pool: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
    let categorias = CategoriaRepository::new(pool);
    let pizzas = categorias
        .create(&input::<CategoriaInput>(json!({ "nombre": "Pizzas", "orden": 1 }))?)
        .await?;
    let bebidas = categorias
        .create(&input::<CategoriaInput>(json!({ "nombre": "Bebidas", "orden": 2 }))?)
        .await?;

    let productos = [
        json!({
            "categoria_id": pizzas.id, "nombre": "Pizza Americana", "sku": "PZ-AME",
            "precio": "32.90", "stock": 40, "stock_minimo": 5, "destacado": true,
        }),
        json!({
            "categoria_id": pizzas.id, "nombre": "Pizza Hawaiana", "sku": "PZ-HAW",
            "precio": "36.90", "precio_oferta": "29.90", "stock": 25, "stock_minimo": 5,
        }),
        json!({
            "categoria_id": bebidas.id, "nombre": "Chicha Morada 1L", "sku": "BB-CHI",
            "precio": "8.50", "stock": 60, "stock_minimo": 10,
        }),
        json!({
            "categoria_id": bebidas.id, "nombre": "Inca Kola 1.5L", "sku": "BB-INK",
            "precio": "9.00", "stock": 4, "stock_minimo": 10,
        }),
    ];

    let servicio = CatalogoService::new(pool);
    for producto in productos {
        servicio
            .crear_producto(&input::<ProductoInput>(producto)?)
            .await?;
    }

    info!("Catalog seeded");
    Ok(())
}

async fn seed_reparto(
    pool: &PgPool,
    distritos: &[DistritoId],
) -> Result<(), Box<dyn std::error::Error>> {
    let horarios: Vec<Value> = (0..7)
        .map(|dia| json!({ "dia_semana": dia, "hora_inicio": "11:00:00", "hora_fin": "23:00:00" }))
        .collect();
    let cubiertos: Vec<Value> = distritos
        .iter()
        .map(|id| json!({ "distrito_id": id }))
        .collect();

    let zona = ZonaRepository::new(pool)
        .create(&input::<ZonaInput>(json!({
            "nombre": "Lima Centro",
            "descripcion": "Reparto propio desde el local de Miraflores",
            "costo_envio_base": "6.00",
            "pedido_minimo": "20.00",
            "envio_gratis_desde": "120.00",
            "tiempo_entrega_min": 30,
            "tiempo_entrega_max": 50,
            "latitud_centro": -12.1211,
            "longitud_centro": -77.0297,
            "radio_cobertura_km": 8.0,
            "distritos": cubiertos,
            "tarifas": [
                { "distancia_desde_km": 0.0, "distancia_hasta_km": 3.0, "costo_envio": "5.00" },
                { "distancia_desde_km": 3.0, "distancia_hasta_km": 6.0, "costo_envio": "8.00",
                  "tiempo_adicional_min": 10 },
                { "distancia_desde_km": 6.0, "costo_envio": "12.00", "tiempo_adicional_min": 20 },
            ],
            "horarios": horarios,
        }))?)
        .await?;

    info!(zona_id = %zona.zona.id, "Delivery zone seeded");
    Ok(())
}

async fn seed_cliente(
    pool: &PgPool,
    distritos: &[DistritoId],
) -> Result<(), Box<dyn std::error::Error>> {
    let nuevo = input::<ClienteInput>(json!({
        "nombre": "Rosa",
        "apellidos": "Quispe Mamani",
        "email": "rosa.quispe@example.com",
        "telefono": "+51 987 654 321",
        "tipo_documento": "dni",
        "numero_documento": "45678912",
        "limite_credito": "500.00",
    }))?
    .validate()?;
    let cliente = ClienteRepository::new(pool).create(&nuevo).await?;

    let miraflores = distritos.get(2).copied().ok_or("Miraflores was not seeded")?;
    DireccionRepository::new(pool)
        .create(&input::<DireccionInput>(json!({
            "cliente_id": cliente.id,
            "distrito_id": miraflores,
            "alias": "Casa",
            "direccion": "Av. Larco 345, dpto. 502",
            "referencia": "Frente al parque Kennedy",
            "latitud": -12.1219,
            "longitud": -77.0301,
        }))?)
        .await?;

    info!(cliente_id = %cliente.id, "Customer seeded");
    Ok(())
}

async fn seed_cupon(pool: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
    sqlx::query(
        "INSERT INTO cupones (codigo, descripcion, tipo, valor, monto_minimo, descuento_maximo, limite_uso) \
         VALUES ('BIENVENIDA10', '10% en tu primer pedido', 'porcentaje', 10, 40, 15, 100) \
         ON CONFLICT (codigo) DO NOTHING",
    )
    .execute(pool)
    .await?;

    info!("Coupon seeded");
    Ok(())
}
