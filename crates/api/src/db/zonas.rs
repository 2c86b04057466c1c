//! Database operations for delivery zones and their pricing rows.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use tienda_core::reparto::{
    Coordenadas, CostoEnvioDinamico, ExcepcionZona, HorarioZona, ZonaConfig, ZonaDistrito,
    ZonaReparto,
};
use tienda_core::{
    CostoEnvioDinamicoId, DistritoId, ExcepcionZonaId, HorarioZonaId, TipoExcepcion,
    ZonaDistritoId, ZonaRepartoId,
};

use super::RepositoryError;
use crate::models::reparto::{ExcepcionInput, ZonaInput};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ZonaRow {
    id: i32,
    nombre: String,
    descripcion: Option<String>,
    costo_envio_base: Decimal,
    pedido_minimo: Option<Decimal>,
    envio_gratis_desde: Option<Decimal>,
    tiempo_entrega_min: i32,
    tiempo_entrega_max: i32,
    latitud_centro: Option<f64>,
    longitud_centro: Option<f64>,
    radio_cobertura_km: Option<f64>,
    prioridad: i32,
    activo: bool,
}

impl From<ZonaRow> for ZonaReparto {
    fn from(row: ZonaRow) -> Self {
        Self {
            id: ZonaRepartoId::new(row.id),
            nombre: row.nombre,
            descripcion: row.descripcion,
            costo_envio_base: row.costo_envio_base,
            pedido_minimo: row.pedido_minimo,
            envio_gratis_desde: row.envio_gratis_desde,
            tiempo_entrega_min: row.tiempo_entrega_min,
            tiempo_entrega_max: row.tiempo_entrega_max,
            centro: Coordenadas::from_columns(row.latitud_centro, row.longitud_centro),
            radio_cobertura_km: row.radio_cobertura_km,
            prioridad: row.prioridad,
            activo: row.activo,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ZonaDistritoRow {
    id: i32,
    zona_reparto_id: i32,
    distrito_id: i32,
    costo_envio: Option<Decimal>,
    tiempo_entrega_min: Option<i32>,
    tiempo_entrega_max: Option<i32>,
    activo: bool,
}

impl From<ZonaDistritoRow> for ZonaDistrito {
    fn from(row: ZonaDistritoRow) -> Self {
        Self {
            id: ZonaDistritoId::new(row.id),
            zona_reparto_id: ZonaRepartoId::new(row.zona_reparto_id),
            distrito_id: DistritoId::new(row.distrito_id),
            costo_envio: row.costo_envio,
            tiempo_entrega_min: row.tiempo_entrega_min,
            tiempo_entrega_max: row.tiempo_entrega_max,
            activo: row.activo,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TarifaRow {
    id: i32,
    zona_reparto_id: i32,
    distancia_desde_km: f64,
    distancia_hasta_km: Option<f64>,
    costo_envio: Decimal,
    tiempo_adicional_min: i32,
    activo: bool,
}

impl From<TarifaRow> for CostoEnvioDinamico {
    fn from(row: TarifaRow) -> Self {
        Self {
            id: CostoEnvioDinamicoId::new(row.id),
            zona_reparto_id: ZonaRepartoId::new(row.zona_reparto_id),
            distancia_desde_km: row.distancia_desde_km,
            distancia_hasta_km: row.distancia_hasta_km,
            costo_envio: row.costo_envio,
            tiempo_adicional_min: row.tiempo_adicional_min,
            activo: row.activo,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HorarioRow {
    id: i32,
    zona_reparto_id: i32,
    dia_semana: i16,
    hora_inicio: NaiveTime,
    hora_fin: NaiveTime,
    activo: bool,
}

impl From<HorarioRow> for HorarioZona {
    fn from(row: HorarioRow) -> Self {
        Self {
            id: HorarioZonaId::new(row.id),
            zona_reparto_id: ZonaRepartoId::new(row.zona_reparto_id),
            dia_semana: row.dia_semana,
            hora_inicio: row.hora_inicio,
            hora_fin: row.hora_fin,
            activo: row.activo,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ExcepcionRow {
    id: i32,
    zona_reparto_id: i32,
    tipo: TipoExcepcion,
    fecha_inicio: NaiveDate,
    fecha_fin: NaiveDate,
    hora_inicio: Option<NaiveTime>,
    hora_fin: Option<NaiveTime>,
    costo_envio: Option<Decimal>,
    tiempo_entrega_min: Option<i32>,
    tiempo_entrega_max: Option<i32>,
    motivo: Option<String>,
    activo: bool,
}

impl From<ExcepcionRow> for ExcepcionZona {
    fn from(row: ExcepcionRow) -> Self {
        Self {
            id: ExcepcionZonaId::new(row.id),
            zona_reparto_id: ZonaRepartoId::new(row.zona_reparto_id),
            tipo: row.tipo,
            fecha_inicio: row.fecha_inicio,
            fecha_fin: row.fecha_fin,
            hora_inicio: row.hora_inicio,
            hora_fin: row.hora_fin,
            costo_envio: row.costo_envio,
            tiempo_entrega_min: row.tiempo_entrega_min,
            tiempo_entrega_max: row.tiempo_entrega_max,
            motivo: row.motivo,
            activo: row.activo,
        }
    }
}

const ZONA_COLUMNS: &str = "id, nombre, descripcion, costo_envio_base, pedido_minimo, \
     envio_gratis_desde, tiempo_entrega_min, tiempo_entrega_max, latitud_centro, \
     longitud_centro, radio_cobertura_km, prioridad, activo";

const EXCEPCION_COLUMNS: &str = "id, zona_reparto_id, tipo, fecha_inicio, fecha_fin, \
     hora_inicio, hora_fin, costo_envio, tiempo_entrega_min, tiempo_entrega_max, motivo, activo";

// =============================================================================
// Repository
// =============================================================================

/// Repository for delivery zone database operations.
pub struct ZonaRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ZonaRepository<'a> {
    /// Create a new zone repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Every zone that is not deleted, with all its pricing rows.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_configs(&self) -> Result<Vec<ZonaConfig>, RepositoryError> {
        let zonas = sqlx::query_as::<_, ZonaRow>(&format!(
            "SELECT {ZONA_COLUMNS} FROM zonas_reparto \
             WHERE deleted_at IS NULL ORDER BY prioridad, id"
        ))
        .fetch_all(self.pool)
        .await?;

        let mut conn = self.pool.acquire().await?;
        cargar_configs(&mut conn, zonas).await
    }

    /// One zone with all its pricing rows.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_config(&self, id: ZonaRepartoId) -> Result<Option<ZonaConfig>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        get_config(&mut conn, id).await
    }

    /// Create a zone with its distritos, tiers and schedules.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` when a distrito does not exist.
    pub async fn create(&self, input: &ZonaInput) -> Result<ZonaConfig, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (id,): (i32,) = sqlx::query_as(
            "INSERT INTO zonas_reparto ( \
                 nombre, descripcion, costo_envio_base, pedido_minimo, envio_gratis_desde, \
                 tiempo_entrega_min, tiempo_entrega_max, latitud_centro, longitud_centro, \
                 radio_cobertura_km, prioridad, activo \
             ) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING id",
        )
        .bind(input.nombre.trim())
        .bind(input.descripcion())
        .bind(input.costo_envio_base)
        .bind(input.pedido_minimo)
        .bind(input.envio_gratis_desde)
        .bind(input.tiempo_entrega_min)
        .bind(input.tiempo_entrega_max)
        .bind(input.latitud_centro)
        .bind(input.longitud_centro)
        .bind(input.radio_cobertura_km)
        .bind(input.prioridad)
        .bind(input.activo)
        .fetch_one(&mut *tx)
        .await?;
        let id = ZonaRepartoId::new(id);

        insertar_hijos(&mut tx, id, input).await?;
        let config = get_config(&mut tx, id).await?.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;

        tracing::info!(zona_reparto_id = %id, nombre = %config.zona.nombre, "Zona de reparto creada");
        Ok(config)
    }

    /// Update a zone, replacing its distritos, tiers and schedules.
    ///
    /// Exceptions are kept; they are managed with [`Self::add_excepcion`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the zone does not exist.
    pub async fn update(
        &self,
        id: ZonaRepartoId,
        input: &ZonaInput,
    ) -> Result<ZonaConfig, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE zonas_reparto SET \
                 nombre = $2, descripcion = $3, costo_envio_base = $4, pedido_minimo = $5, \
                 envio_gratis_desde = $6, tiempo_entrega_min = $7, tiempo_entrega_max = $8, \
                 latitud_centro = $9, longitud_centro = $10, radio_cobertura_km = $11, \
                 prioridad = $12, activo = $13 \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(input.nombre.trim())
        .bind(input.descripcion())
        .bind(input.costo_envio_base)
        .bind(input.pedido_minimo)
        .bind(input.envio_gratis_desde)
        .bind(input.tiempo_entrega_min)
        .bind(input.tiempo_entrega_max)
        .bind(input.latitud_centro)
        .bind(input.longitud_centro)
        .bind(input.radio_cobertura_km)
        .bind(input.prioridad)
        .bind(input.activo)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        for tabla in ["zona_distritos", "costos_envio_dinamico", "horarios_zona"] {
            sqlx::query(&format!("DELETE FROM {tabla} WHERE zona_reparto_id = $1"))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        insertar_hijos(&mut tx, id, input).await?;

        let config = get_config(&mut tx, id).await?.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;

        tracing::info!(zona_reparto_id = %id, "Zona de reparto actualizada");
        Ok(config)
    }

    /// Add a date-bound exception to a zone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the zone does not exist.
    pub async fn add_excepcion(
        &self,
        zona_id: ZonaRepartoId,
        input: &ExcepcionInput,
    ) -> Result<ExcepcionZona, RepositoryError> {
        let row = sqlx::query_as::<_, ExcepcionRow>(&format!(
            "INSERT INTO excepciones_zona ( \
                 zona_reparto_id, tipo, fecha_inicio, fecha_fin, hora_inicio, hora_fin, \
                 costo_envio, tiempo_entrega_min, tiempo_entrega_max, motivo \
             ) \
             SELECT id, $2, $3, $4, $5, $6, $7, $8, $9, $10 \
             FROM zonas_reparto WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {EXCEPCION_COLUMNS}"
        ))
        .bind(zona_id)
        .bind(input.tipo)
        .bind(input.fecha_inicio)
        .bind(input.fecha_fin)
        .bind(input.hora_inicio)
        .bind(input.hora_fin)
        .bind(input.costo_envio)
        .bind(input.tiempo_entrega_min)
        .bind(input.tiempo_entrega_max)
        .bind(input.motivo())
        .fetch_optional(self.pool)
        .await?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }
}

async fn get_config(
    conn: &mut PgConnection,
    id: ZonaRepartoId,
) -> Result<Option<ZonaConfig>, RepositoryError> {
    let zona = sqlx::query_as::<_, ZonaRow>(&format!(
        "SELECT {ZONA_COLUMNS} FROM zonas_reparto WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(zona) = zona else {
        return Ok(None);
    };
    Ok(cargar_configs(conn, vec![zona]).await?.pop())
}

/// Attach child rows to each zone, preserving the zones' order.
async fn cargar_configs(
    conn: &mut PgConnection,
    zonas: Vec<ZonaRow>,
) -> Result<Vec<ZonaConfig>, RepositoryError> {
    let ids: Vec<i32> = zonas.iter().map(|z| z.id).collect();

    let distritos = sqlx::query_as::<_, ZonaDistritoRow>(
        "SELECT id, zona_reparto_id, distrito_id, costo_envio, tiempo_entrega_min, \
                tiempo_entrega_max, activo \
         FROM zona_distritos WHERE zona_reparto_id = ANY($1) ORDER BY id",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let tarifas = sqlx::query_as::<_, TarifaRow>(
        "SELECT id, zona_reparto_id, distancia_desde_km, distancia_hasta_km, costo_envio, \
                tiempo_adicional_min, activo \
         FROM costos_envio_dinamico WHERE zona_reparto_id = ANY($1) \
         ORDER BY distancia_desde_km, id",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let horarios = sqlx::query_as::<_, HorarioRow>(
        "SELECT id, zona_reparto_id, dia_semana, hora_inicio, hora_fin, activo \
         FROM horarios_zona WHERE zona_reparto_id = ANY($1) \
         ORDER BY dia_semana, hora_inicio",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let excepciones = sqlx::query_as::<_, ExcepcionRow>(&format!(
        "SELECT {EXCEPCION_COLUMNS} FROM excepciones_zona \
         WHERE zona_reparto_id = ANY($1) ORDER BY fecha_inicio, id"
    ))
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut configs: Vec<ZonaConfig> = zonas
        .into_iter()
        .map(|row| ZonaConfig::new(row.into()))
        .collect();
    let posicion: HashMap<ZonaRepartoId, usize> = configs
        .iter()
        .enumerate()
        .map(|(i, c)| (c.zona.id, i))
        .collect();
    let config_de = |zona: i32| posicion.get(&ZonaRepartoId::new(zona)).copied();

    for row in distritos {
        if let Some(i) = config_de(row.zona_reparto_id)
            && let Some(config) = configs.get_mut(i)
        {
            config.distritos.push(row.into());
        }
    }
    for row in tarifas {
        if let Some(i) = config_de(row.zona_reparto_id)
            && let Some(config) = configs.get_mut(i)
        {
            config.tarifas.push(row.into());
        }
    }
    for row in horarios {
        if let Some(i) = config_de(row.zona_reparto_id)
            && let Some(config) = configs.get_mut(i)
        {
            config.horarios.push(row.into());
        }
    }
    for row in excepciones {
        if let Some(i) = config_de(row.zona_reparto_id)
            && let Some(config) = configs.get_mut(i)
        {
            config.excepciones.push(row.into());
        }
    }

    Ok(configs)
}

async fn insertar_hijos(
    conn: &mut PgConnection,
    id: ZonaRepartoId,
    input: &ZonaInput,
) -> Result<(), RepositoryError> {
    for distrito in &input.distritos {
        sqlx::query(
            "INSERT INTO zona_distritos ( \
                 zona_reparto_id, distrito_id, costo_envio, tiempo_entrega_min, tiempo_entrega_max \
             ) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(distrito.distrito_id)
        .bind(distrito.costo_envio)
        .bind(distrito.tiempo_entrega_min)
        .bind(distrito.tiempo_entrega_max)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            RepositoryError::foreign_key_or_database(
                e,
                &format!("el distrito {} no existe", distrito.distrito_id),
            )
        })?;
    }

    for tarifa in &input.tarifas {
        sqlx::query(
            "INSERT INTO costos_envio_dinamico ( \
                 zona_reparto_id, distancia_desde_km, distancia_hasta_km, costo_envio, \
                 tiempo_adicional_min \
             ) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(tarifa.distancia_desde_km)
        .bind(tarifa.distancia_hasta_km)
        .bind(tarifa.costo_envio)
        .bind(tarifa.tiempo_adicional_min)
        .execute(&mut *conn)
        .await?;
    }

    for horario in &input.horarios {
        sqlx::query(
            "INSERT INTO horarios_zona (zona_reparto_id, dia_semana, hora_inicio, hora_fin) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(horario.dia_semana)
        .bind(horario.hora_inicio)
        .bind(horario.hora_fin)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
