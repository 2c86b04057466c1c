//! Delivery zone rows and their per-row rules.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::geo::{Coordenadas, distancia_km};
use crate::types::{
    CostoEnvioDinamicoId, DistritoId, ExcepcionZonaId, HorarioZonaId, TipoExcepcion,
    ZonaDistritoId, ZonaRepartoId,
};

/// Day of week as stored in `horarios_zona.dia_semana` (0 = Sunday .. 6 = Saturday).
#[must_use]
pub fn dia_semana(fecha: NaiveDate) -> i16 {
    // num_days_from_sunday is 0..=6, always fits
    i16::try_from(fecha.weekday().num_days_from_sunday()).unwrap_or_default()
}

/// A delivery zone with its default cost and delivery window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonaReparto {
    pub id: ZonaRepartoId,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub costo_envio_base: Decimal,
    /// Orders below this subtotal are not delivered.
    pub pedido_minimo: Option<Decimal>,
    /// Orders at or above this subtotal ship free.
    pub envio_gratis_desde: Option<Decimal>,
    /// Delivery window in minutes.
    pub tiempo_entrega_min: i32,
    pub tiempo_entrega_max: i32,
    pub centro: Option<Coordenadas>,
    pub radio_cobertura_km: Option<f64>,
    /// Lower value wins when several zones cover an address.
    pub prioridad: i32,
    pub activo: bool,
}

/// Per-distrito override of a zone's cost and delivery window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZonaDistrito {
    pub id: ZonaDistritoId,
    pub zona_reparto_id: ZonaRepartoId,
    pub distrito_id: DistritoId,
    pub costo_envio: Option<Decimal>,
    pub tiempo_entrega_min: Option<i32>,
    pub tiempo_entrega_max: Option<i32>,
    pub activo: bool,
}

/// Distance-tiered shipping cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostoEnvioDinamico {
    pub id: CostoEnvioDinamicoId,
    pub zona_reparto_id: ZonaRepartoId,
    pub distancia_desde_km: f64,
    /// `None` means the tier is open-ended.
    pub distancia_hasta_km: Option<f64>,
    pub costo_envio: Decimal,
    /// Minutes added to both ends of the delivery window.
    pub tiempo_adicional_min: i32,
    pub activo: bool,
}

impl CostoEnvioDinamico {
    /// Whether `distancia` falls in `[desde, hasta)`.
    #[must_use]
    pub fn contiene(&self, distancia: f64) -> bool {
        self.activo
            && distancia >= self.distancia_desde_km
            && self.distancia_hasta_km.is_none_or(|hasta| distancia < hasta)
    }
}

/// Regular opening hours of a zone for one day of the week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HorarioZona {
    pub id: HorarioZonaId,
    pub zona_reparto_id: ZonaRepartoId,
    /// 0 = Sunday .. 6 = Saturday.
    pub dia_semana: i16,
    pub hora_inicio: NaiveTime,
    pub hora_fin: NaiveTime,
    pub activo: bool,
}

impl HorarioZona {
    /// Whether the zone delivers at `hora` on day `dia`.
    #[must_use]
    pub fn abierto_en(&self, dia: i16, hora: NaiveTime) -> bool {
        self.activo && self.dia_semana == dia && hora >= self.hora_inicio && hora < self.hora_fin
    }
}

/// Date-bound override of a zone: holidays, special prices or hours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcepcionZona {
    pub id: ExcepcionZonaId,
    pub zona_reparto_id: ZonaRepartoId,
    pub tipo: TipoExcepcion,
    /// Inclusive date range.
    pub fecha_inicio: NaiveDate,
    pub fecha_fin: NaiveDate,
    /// Optional `[inicio, fin)` hour window; both `None` means all day.
    pub hora_inicio: Option<NaiveTime>,
    pub hora_fin: Option<NaiveTime>,
    pub costo_envio: Option<Decimal>,
    pub tiempo_entrega_min: Option<i32>,
    pub tiempo_entrega_max: Option<i32>,
    pub motivo: Option<String>,
    pub activo: bool,
}

impl ExcepcionZona {
    /// Whether the exception covers `fecha`, ignoring the hour window.
    #[must_use]
    pub fn cubre_fecha(&self, fecha: NaiveDate) -> bool {
        self.activo && fecha >= self.fecha_inicio && fecha <= self.fecha_fin
    }

    /// Whether `hora` falls inside the exception's hour window.
    #[must_use]
    pub fn dentro_de_ventana(&self, hora: NaiveTime) -> bool {
        match (self.hora_inicio, self.hora_fin) {
            (Some(inicio), Some(fin)) => hora >= inicio && hora < fin,
            (Some(inicio), None) => hora >= inicio,
            (None, Some(fin)) => hora < fin,
            (None, None) => true,
        }
    }

    /// Whether the exception is in force at `momento`.
    #[must_use]
    pub fn aplica_en(&self, momento: NaiveDateTime) -> bool {
        self.cubre_fecha(momento.date()) && self.dentro_de_ventana(momento.time())
    }
}

/// A zone with every row that takes part in pricing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonaConfig {
    pub zona: ZonaReparto,
    pub distritos: Vec<ZonaDistrito>,
    pub tarifas: Vec<CostoEnvioDinamico>,
    pub horarios: Vec<HorarioZona>,
    pub excepciones: Vec<ExcepcionZona>,
}

impl ZonaConfig {
    /// A zone with no child rows.
    #[must_use]
    pub const fn new(zona: ZonaReparto) -> Self {
        Self {
            zona,
            distritos: Vec::new(),
            tarifas: Vec::new(),
            horarios: Vec::new(),
            excepciones: Vec::new(),
        }
    }

    /// The active override row for `distrito`, if any.
    #[must_use]
    pub fn distrito(&self, distrito: DistritoId) -> Option<&ZonaDistrito> {
        self.distritos
            .iter()
            .find(|d| d.activo && d.distrito_id == distrito)
    }

    /// The tier whose bracket contains `distancia`, lowest lower bound first.
    #[must_use]
    pub fn tarifa_para(&self, distancia: f64) -> Option<&CostoEnvioDinamico> {
        self.tarifas
            .iter()
            .filter(|t| t.contiene(distancia))
            .min_by(|a, b| a.distancia_desde_km.total_cmp(&b.distancia_desde_km))
    }

    /// Distance from the zone centre, when both points are known.
    #[must_use]
    pub fn distancia_desde_centro(&self, destino: Option<Coordenadas>) -> Option<f64> {
        Some(distancia_km(self.zona.centro?, destino?))
    }

    /// Whether the zone covers an address.
    ///
    /// Covered when an active distrito row matches, or when the coordinates
    /// fall within the coverage radius around the zone centre.
    #[must_use]
    pub fn cubre(&self, distrito: Option<DistritoId>, destino: Option<Coordenadas>) -> bool {
        if distrito.is_some_and(|d| self.distrito(d).is_some()) {
            return true;
        }
        match (self.zona.radio_cobertura_km, self.distancia_desde_centro(destino)) {
            (Some(radio), Some(distancia)) => distancia <= radio,
            _ => false,
        }
    }

    /// Whether regular or special hours allow delivery at `momento`.
    ///
    /// A `horario_especial` exception covering the date replaces the weekly
    /// schedule for that whole date. Zones without any active schedule
    /// deliver around the clock.
    #[must_use]
    pub fn abierta_en(&self, momento: NaiveDateTime) -> bool {
        let fecha = momento.date();
        let hora = momento.time();

        let mut especiales = self
            .excepciones
            .iter()
            .filter(|e| e.tipo == TipoExcepcion::HorarioEspecial && e.cubre_fecha(fecha))
            .peekable();
        if especiales.peek().is_some() {
            return especiales.any(|e| e.dentro_de_ventana(hora));
        }

        let mut activos = self.horarios.iter().filter(|h| h.activo).peekable();
        if activos.peek().is_none() {
            return true;
        }
        let dia = dia_semana(fecha);
        activos.any(|h| h.abierto_en(dia, hora))
    }

    /// Active exceptions in force at `momento`, in id order.
    pub fn excepciones_en(&self, momento: NaiveDateTime) -> impl Iterator<Item = &ExcepcionZona> {
        let mut vigentes: Vec<&ExcepcionZona> = self
            .excepciones
            .iter()
            .filter(|e| e.aplica_en(momento))
            .collect();
        vigentes.sort_by_key(|e| e.id);
        vigentes.into_iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn zona() -> ZonaReparto {
        ZonaReparto {
            id: ZonaRepartoId::new(1),
            nombre: "Lima Centro".to_string(),
            descripcion: None,
            costo_envio_base: dec!(8.00),
            pedido_minimo: None,
            envio_gratis_desde: None,
            tiempo_entrega_min: 30,
            tiempo_entrega_max: 45,
            centro: Some(Coordenadas::new(-12.0464, -77.0428)),
            radio_cobertura_km: Some(5.0),
            prioridad: 1,
            activo: true,
        }
    }

    fn tarifa(desde: f64, hasta: Option<f64>) -> CostoEnvioDinamico {
        CostoEnvioDinamico {
            id: CostoEnvioDinamicoId::new(1),
            zona_reparto_id: ZonaRepartoId::new(1),
            distancia_desde_km: desde,
            distancia_hasta_km: hasta,
            costo_envio: dec!(10),
            tiempo_adicional_min: 0,
            activo: true,
        }
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_time(time(h, mi))
    }

    #[test]
    fn test_tier_bracket_is_half_open() {
        let t = tarifa(3.0, Some(6.0));
        assert!(!t.contiene(2.99));
        assert!(t.contiene(3.0));
        assert!(t.contiene(5.99));
        assert!(!t.contiene(6.0));
    }

    #[test]
    fn test_open_ended_tier() {
        let t = tarifa(10.0, None);
        assert!(t.contiene(250.0));
    }

    #[test]
    fn test_inactive_tier_never_matches() {
        let mut t = tarifa(0.0, None);
        t.activo = false;
        assert!(!t.contiene(1.0));
    }

    #[test]
    fn test_dia_semana_starts_on_sunday() {
        // 2026-10-18 is a Sunday
        assert_eq!(dia_semana(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()), 0);
        assert_eq!(dia_semana(NaiveDate::from_ymd_opt(2026, 10, 24).unwrap()), 6);
    }

    #[test]
    fn test_horario_end_is_exclusive() {
        let h = HorarioZona {
            id: HorarioZonaId::new(1),
            zona_reparto_id: ZonaRepartoId::new(1),
            dia_semana: 1,
            hora_inicio: time(9, 0),
            hora_fin: time(21, 0),
            activo: true,
        };
        assert!(h.abierto_en(1, time(9, 0)));
        assert!(h.abierto_en(1, time(20, 59)));
        assert!(!h.abierto_en(1, time(21, 0)));
        assert!(!h.abierto_en(2, time(12, 0)));
    }

    #[test]
    fn test_cubre_by_radius_and_distrito() {
        let mut config = ZonaConfig::new(zona());
        let cerca = Coordenadas::new(-12.05, -77.04);
        let lejos = Coordenadas::new(-12.1211, -77.0297);
        assert!(config.cubre(None, Some(cerca)));
        assert!(!config.cubre(None, Some(lejos)));
        assert!(!config.cubre(Some(DistritoId::new(5)), None));

        config.distritos.push(ZonaDistrito {
            id: ZonaDistritoId::new(1),
            zona_reparto_id: ZonaRepartoId::new(1),
            distrito_id: DistritoId::new(5),
            costo_envio: None,
            tiempo_entrega_min: None,
            tiempo_entrega_max: None,
            activo: true,
        });
        assert!(config.cubre(Some(DistritoId::new(5)), Some(lejos)));
    }

    #[test]
    fn test_no_schedule_means_always_open() {
        let config = ZonaConfig::new(zona());
        assert!(config.abierta_en(at(2026, 10, 18, 3, 0)));
    }

    #[test]
    fn test_special_hours_replace_weekly_schedule() {
        let mut config = ZonaConfig::new(zona());
        config.horarios.push(HorarioZona {
            id: HorarioZonaId::new(1),
            zona_reparto_id: ZonaRepartoId::new(1),
            dia_semana: 4,
            hora_inicio: time(9, 0),
            hora_fin: time(21, 0),
            activo: true,
        });
        config.excepciones.push(ExcepcionZona {
            id: ExcepcionZonaId::new(1),
            zona_reparto_id: ZonaRepartoId::new(1),
            tipo: TipoExcepcion::HorarioEspecial,
            fecha_inicio: NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
            fecha_fin: NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
            hora_inicio: Some(time(12, 0)),
            hora_fin: Some(time(16, 0)),
            costo_envio: None,
            tiempo_entrega_min: None,
            tiempo_entrega_max: None,
            motivo: Some("Horario reducido".to_string()),
            activo: true,
        });

        // Thursday 2026-10-15: special hours only
        assert!(!config.abierta_en(at(2026, 10, 15, 10, 0)));
        assert!(config.abierta_en(at(2026, 10, 15, 13, 0)));
        // Thursday 2026-10-22: regular schedule
        assert!(config.abierta_en(at(2026, 10, 22, 10, 0)));
    }

    #[test]
    fn test_exception_window_variants() {
        let mut e = ExcepcionZona {
            id: ExcepcionZonaId::new(1),
            zona_reparto_id: ZonaRepartoId::new(1),
            tipo: TipoExcepcion::NoDisponible,
            fecha_inicio: NaiveDate::from_ymd_opt(2026, 12, 24).unwrap(),
            fecha_fin: NaiveDate::from_ymd_opt(2026, 12, 25).unwrap(),
            hora_inicio: None,
            hora_fin: None,
            costo_envio: None,
            tiempo_entrega_min: None,
            tiempo_entrega_max: None,
            motivo: None,
            activo: true,
        };
        assert!(e.aplica_en(at(2026, 12, 25, 23, 59)));
        assert!(!e.aplica_en(at(2026, 12, 26, 0, 0)));

        e.hora_inicio = Some(time(18, 0));
        assert!(!e.aplica_en(at(2026, 12, 24, 17, 59)));
        assert!(e.aplica_en(at(2026, 12, 24, 18, 0)));

        e.activo = false;
        assert!(!e.aplica_en(at(2026, 12, 24, 19, 0)));
    }
}
