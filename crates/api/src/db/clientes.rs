//! Database operations for customers, addresses and address validations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use tienda_core::reparto::Coordenadas;
use tienda_core::{
    ClienteId, DireccionId, DireccionValidadaId, DistritoId, Documento, Email, TipoDocumento,
    ZonaRepartoId,
};

use super::RepositoryError;
use crate::models::cliente::{Cliente, Direccion, DireccionInput, DireccionValidada, NuevoCliente};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ClienteRow {
    id: i32,
    nombre: String,
    apellidos: Option<String>,
    email: String,
    telefono: Option<String>,
    tipo_documento: Option<TipoDocumento>,
    numero_documento: Option<String>,
    limite_credito: Decimal,
    credito_usado: Decimal,
    activo: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<ClienteRow> for Cliente {
    type Error = RepositoryError;

    fn try_from(row: ClienteRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("cliente {}: email: {e}", row.id))
        })?;
        let documento = match (row.tipo_documento, row.numero_documento.as_deref()) {
            (Some(tipo), Some(numero)) => Some(Documento::parse(tipo, numero).map_err(|e| {
                RepositoryError::DataCorruption(format!("cliente {}: documento: {e}", row.id))
            })?),
            _ => None,
        };

        Ok(Self {
            id: ClienteId::new(row.id),
            nombre: row.nombre,
            apellidos: row.apellidos,
            email,
            telefono: row.telefono,
            documento,
            limite_credito: row.limite_credito,
            credito_usado: row.credito_usado,
            activo: row.activo,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DireccionRow {
    id: i32,
    cliente_id: i32,
    distrito_id: i32,
    alias: Option<String>,
    direccion: String,
    referencia: Option<String>,
    latitud: Option<f64>,
    longitud: Option<f64>,
    es_principal: bool,
    created_at: DateTime<Utc>,
}

impl From<DireccionRow> for Direccion {
    fn from(row: DireccionRow) -> Self {
        Self {
            id: DireccionId::new(row.id),
            cliente_id: ClienteId::new(row.cliente_id),
            distrito_id: DistritoId::new(row.distrito_id),
            alias: row.alias,
            direccion: row.direccion,
            referencia: row.referencia,
            coordenadas: Coordenadas::from_columns(row.latitud, row.longitud),
            es_principal: row.es_principal,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ValidacionRow {
    id: i32,
    direccion_id: i32,
    zona_reparto_id: Option<i32>,
    es_valida: bool,
    distancia_km: Option<f64>,
    costo_envio: Option<Decimal>,
    tiempo_entrega_min: Option<i32>,
    tiempo_entrega_max: Option<i32>,
    mensaje: Option<String>,
    validado_en: DateTime<Utc>,
}

impl From<ValidacionRow> for DireccionValidada {
    fn from(row: ValidacionRow) -> Self {
        Self {
            id: DireccionValidadaId::new(row.id),
            direccion_id: DireccionId::new(row.direccion_id),
            zona_reparto_id: row.zona_reparto_id.map(ZonaRepartoId::new),
            es_valida: row.es_valida,
            distancia_km: row.distancia_km,
            costo_envio: row.costo_envio,
            tiempo_entrega_min: row.tiempo_entrega_min,
            tiempo_entrega_max: row.tiempo_entrega_max,
            mensaje: row.mensaje,
            validado_en: row.validado_en,
        }
    }
}

const CLIENTE_COLUMNS: &str = "id, nombre, apellidos, email, telefono, tipo_documento, \
     numero_documento, limite_credito, credito_usado, activo, created_at";

const DIRECCION_COLUMNS: &str = "id, cliente_id, distrito_id, alias, direccion, referencia, \
     latitud, longitud, es_principal, created_at";

const VALIDACION_COLUMNS: &str = "id, direccion_id, zona_reparto_id, es_valida, distancia_km, \
     costo_envio, tiempo_entrega_min, tiempo_entrega_max, mensaje, validado_en";

// =============================================================================
// Customers
// =============================================================================

/// Repository for customer database operations.
pub struct ClienteRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ClienteRepository<'a> {
    /// Create a new customer repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a customer by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails and
    /// `RepositoryError::DataCorruption` if stored fields no longer parse.
    pub async fn get(&self, id: ClienteId) -> Result<Option<Cliente>, RepositoryError> {
        let row = sqlx::query_as::<_, ClienteRow>(&format!(
            "SELECT {CLIENTE_COLUMNS} FROM clientes WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Cliente::try_from).transpose()
    }

    /// Create a customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email or document is taken.
    pub async fn create(&self, nuevo: &NuevoCliente) -> Result<Cliente, RepositoryError> {
        let row = sqlx::query_as::<_, ClienteRow>(&format!(
            "INSERT INTO clientes ( \
                 nombre, apellidos, email, telefono, tipo_documento, numero_documento, limite_credito \
             ) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {CLIENTE_COLUMNS}"
        ))
        .bind(&nuevo.nombre)
        .bind(nuevo.apellidos.as_deref())
        .bind(nuevo.email.as_str())
        .bind(nuevo.telefono.as_deref())
        .bind(nuevo.documento.as_ref().map(Documento::tipo))
        .bind(nuevo.documento.as_ref().map(Documento::numero))
        .bind(nuevo.limite_credito)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            RepositoryError::unique_or_database(e, "ya existe un cliente con ese email o documento")
        })?;

        Cliente::try_from(row)
    }
}

/// Load a live customer and lock the row until the transaction ends.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(
    conn: &mut PgConnection,
    id: ClienteId,
) -> Result<Option<Cliente>, RepositoryError> {
    let row = sqlx::query_as::<_, ClienteRow>(&format!(
        "SELECT {CLIENTE_COLUMNS} FROM clientes \
         WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(Cliente::try_from).transpose()
}

/// Store a customer's new `credito_usado`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails, including when
/// the amount breaks the credit range constraint.
pub async fn set_credito_usado(
    conn: &mut PgConnection,
    id: ClienteId,
    credito_usado: Decimal,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE clientes SET credito_usado = $2 WHERE id = $1")
        .bind(id)
        .bind(credito_usado)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Addresses
// =============================================================================

/// Repository for address database operations.
pub struct DireccionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DireccionRepository<'a> {
    /// Create a new address repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an address by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: DireccionId) -> Result<Option<Direccion>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        get_direccion(&mut conn, id).await
    }

    /// Addresses of a customer, main address first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_cliente(
        &self,
        cliente_id: ClienteId,
    ) -> Result<Vec<Direccion>, RepositoryError> {
        let rows = sqlx::query_as::<_, DireccionRow>(&format!(
            "SELECT {DIRECCION_COLUMNS} FROM direcciones \
             WHERE cliente_id = $1 AND deleted_at IS NULL \
             ORDER BY es_principal DESC, id"
        ))
        .bind(cliente_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Create an address. A new main address demotes the previous one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist and
    /// `RepositoryError::Conflict` if the distrito does not exist.
    pub async fn create(&self, input: &DireccionInput) -> Result<Direccion, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if lock(&mut tx, input.cliente_id).await?.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let (principales,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM direcciones \
             WHERE cliente_id = $1 AND es_principal AND deleted_at IS NULL",
        )
        .bind(input.cliente_id)
        .fetch_one(&mut *tx)
        .await?;
        // The first address is always the main one.
        let es_principal = input.es_principal || principales == 0;
        if es_principal {
            sqlx::query(
                "UPDATE direcciones SET es_principal = FALSE \
                 WHERE cliente_id = $1 AND es_principal AND deleted_at IS NULL",
            )
            .bind(input.cliente_id)
            .execute(&mut *tx)
            .await?;
        }

        let coordenadas = input.coordenadas();
        let row = sqlx::query_as::<_, DireccionRow>(&format!(
            "INSERT INTO direcciones ( \
                 cliente_id, distrito_id, alias, direccion, referencia, latitud, longitud, es_principal \
             ) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {DIRECCION_COLUMNS}"
        ))
        .bind(input.cliente_id)
        .bind(input.distrito_id)
        .bind(crate::models::texto_opcional(input.alias.as_deref()))
        .bind(input.direccion.trim())
        .bind(crate::models::texto_opcional(input.referencia.as_deref()))
        .bind(coordenadas.map(|c| c.latitud))
        .bind(coordenadas.map(|c| c.longitud))
        .bind(es_principal)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::foreign_key_or_database(e, "el distrito no existe"))?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Store the outcome of validating an address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn registrar_validacion(
        &self,
        validacion: &NuevaValidacion,
    ) -> Result<DireccionValidada, RepositoryError> {
        let row = sqlx::query_as::<_, ValidacionRow>(&format!(
            "INSERT INTO direcciones_validadas ( \
                 direccion_id, zona_reparto_id, es_valida, distancia_km, costo_envio, \
                 tiempo_entrega_min, tiempo_entrega_max, mensaje \
             ) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {VALIDACION_COLUMNS}"
        ))
        .bind(validacion.direccion_id)
        .bind(validacion.zona_reparto_id)
        .bind(validacion.es_valida)
        .bind(validacion.distancia_km)
        .bind(validacion.costo_envio)
        .bind(validacion.tiempo_entrega_min)
        .bind(validacion.tiempo_entrega_max)
        .bind(validacion.mensaje.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }
}

/// A validation outcome before it is stored.
#[derive(Debug, Clone)]
pub struct NuevaValidacion {
    pub direccion_id: DireccionId,
    pub zona_reparto_id: Option<ZonaRepartoId>,
    pub es_valida: bool,
    pub distancia_km: Option<f64>,
    pub costo_envio: Option<Decimal>,
    pub tiempo_entrega_min: Option<i32>,
    pub tiempo_entrega_max: Option<i32>,
    pub mensaje: Option<String>,
}

/// Get a live address by ID.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_direccion(
    conn: &mut PgConnection,
    id: DireccionId,
) -> Result<Option<Direccion>, RepositoryError> {
    let row = sqlx::query_as::<_, DireccionRow>(&format!(
        "SELECT {DIRECCION_COLUMNS} FROM direcciones WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}
