//! Shipping quotes: zone selection and cost/time resolution.

use chrono::{Duration, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::geo::Coordenadas;
use super::zona::ZonaConfig;
use crate::types::{DistritoId, ExcepcionZonaId, TipoExcepcion, ZonaRepartoId, format_soles};

/// Input for a shipping quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolicitudEnvio {
    pub distrito_id: Option<DistritoId>,
    pub coordenadas: Option<Coordenadas>,
    /// Order subtotal before tax, used for minimum-order and free-shipping rules.
    pub subtotal: Decimal,
    /// Local store time of the request.
    pub momento: NaiveDateTime,
}

/// Which rule produced the final shipping cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrigenCosto {
    Base,
    Distrito,
    Dinamico,
    Excepcion,
    EnvioGratis,
}

/// A resolved shipping quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CotizacionEnvio {
    pub zona_reparto_id: ZonaRepartoId,
    pub zona_nombre: String,
    pub costo_envio: Decimal,
    pub tiempo_entrega_min: i32,
    pub tiempo_entrega_max: i32,
    pub distancia_km: Option<f64>,
    pub origen_costo: OrigenCosto,
    pub excepciones_aplicadas: Vec<ExcepcionZonaId>,
}

impl CotizacionEnvio {
    /// Human readable delivery window, e.g. `30-45 min`.
    #[must_use]
    pub fn tiempo_entrega_texto(&self) -> String {
        tiempo_entrega_texto(self.tiempo_entrega_min, self.tiempo_entrega_max)
    }

    /// Shipping cost formatted for display.
    #[must_use]
    pub fn costo_envio_formateado(&self) -> String {
        format_soles(self.costo_envio)
    }

    #[must_use]
    pub fn es_gratis(&self) -> bool {
        self.costo_envio.is_zero()
    }
}

/// Why an address cannot be served.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RechazoCobertura {
    #[error("no hay zona de reparto que cubra la dirección")]
    SinZona,
    #[error("la zona de reparto no está activa")]
    ZonaInactiva,
    #[error("la dirección está fuera de la zona de cobertura")]
    FueraDeCobertura { distancia_km: Option<f64> },
    #[error("la zona no atiende en este horario")]
    FueraDeHorario,
    #[error("zona no disponible: {}", motivo.as_deref().unwrap_or("sin motivo"))]
    NoDisponible { motivo: Option<String> },
    #[error("el pedido mínimo para esta zona es {}", format_soles(*minimo))]
    PedidoMinimoNoAlcanzado { minimo: Decimal },
}

/// Format a delivery window in minutes.
///
/// Whole-hour windows are shown in hours (`1-2 h`), everything else in
/// minutes (`30-45 min`). Equal ends collapse to a single value.
#[must_use]
pub fn tiempo_entrega_texto(min: i32, max: i32) -> String {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };
    if min > 0 && min % 60 == 0 && max % 60 == 0 {
        let (hmin, hmax) = (min / 60, max / 60);
        if hmin == hmax {
            format!("{hmin} h")
        } else {
            format!("{hmin}-{hmax} h")
        }
    } else if min == max {
        format!("{min} min")
    } else {
        format!("{min}-{max} min")
    }
}

/// Earliest and latest estimated delivery instants for a quote.
#[must_use]
pub fn ventana_entrega(
    desde: NaiveDateTime,
    cotizacion: &CotizacionEnvio,
) -> (NaiveDateTime, NaiveDateTime) {
    (
        desde + Duration::minutes(i64::from(cotizacion.tiempo_entrega_min)),
        desde + Duration::minutes(i64::from(cotizacion.tiempo_entrega_max)),
    )
}

/// Pick the zone that should serve an address.
///
/// Among active zones covering the address: a distrito match beats a
/// radius match, then lower `prioridad` wins, then the nearest centre.
#[must_use]
pub fn resolver_zona<'a>(
    zonas: &'a [ZonaConfig],
    solicitud: &SolicitudEnvio,
) -> Option<&'a ZonaConfig> {
    zonas
        .iter()
        .filter(|z| z.zona.activo && z.cubre(solicitud.distrito_id, solicitud.coordenadas))
        .min_by(|a, b| {
            let rank = |z: &ZonaConfig| {
                let por_distrito = solicitud
                    .distrito_id
                    .and_then(|d| z.distrito(d))
                    .is_some();
                (!por_distrito, z.zona.prioridad)
            };
            let distancia = |z: &ZonaConfig| {
                z.distancia_desde_centro(solicitud.coordenadas)
                    .unwrap_or(f64::MAX)
            };
            rank(a)
                .cmp(&rank(b))
                .then_with(|| distancia(a).total_cmp(&distancia(b)))
        })
}

/// Resolve the serving zone and quote it.
///
/// # Errors
///
/// Returns [`RechazoCobertura::SinZona`] when no active zone covers the
/// address, otherwise whatever [`cotizar`] rejects with.
pub fn cotizar_mejor(
    zonas: &[ZonaConfig],
    solicitud: &SolicitudEnvio,
) -> Result<CotizacionEnvio, RechazoCobertura> {
    let zona = resolver_zona(zonas, solicitud).ok_or(RechazoCobertura::SinZona)?;
    cotizar(zona, solicitud)
}

/// Quote shipping for an address in a specific zone.
///
/// Coverage and `no_disponible` exceptions are checked before the schedule.
/// Cost precedence, highest first: `costo_especial` exception, distrito
/// override, distance tier, zone base. Free shipping applies last.
///
/// # Errors
///
/// Returns a [`RechazoCobertura`] when the zone is inactive, does not cover
/// the address, is closed or unavailable at the requested time, or the
/// subtotal is below the zone minimum.
pub fn cotizar(
    config: &ZonaConfig,
    solicitud: &SolicitudEnvio,
) -> Result<CotizacionEnvio, RechazoCobertura> {
    let zona = &config.zona;
    if !zona.activo {
        return Err(RechazoCobertura::ZonaInactiva);
    }

    let distancia = config.distancia_desde_centro(solicitud.coordenadas);
    if !config.cubre(solicitud.distrito_id, solicitud.coordenadas) {
        return Err(RechazoCobertura::FueraDeCobertura {
            distancia_km: distancia,
        });
    }

    let vigentes: Vec<_> = config.excepciones_en(solicitud.momento).collect();
    if let Some(cierre) = vigentes
        .iter()
        .find(|e| e.tipo == TipoExcepcion::NoDisponible)
    {
        return Err(RechazoCobertura::NoDisponible {
            motivo: cierre.motivo.clone(),
        });
    }

    if !config.abierta_en(solicitud.momento) {
        return Err(RechazoCobertura::FueraDeHorario);
    }

    let mut costo = zona.costo_envio_base;
    let mut origen = OrigenCosto::Base;
    let mut tiempo_min = zona.tiempo_entrega_min;
    let mut tiempo_max = zona.tiempo_entrega_max;

    let tarifa = distancia.and_then(|d| config.tarifa_para(d));
    if let Some(tarifa) = tarifa {
        costo = tarifa.costo_envio;
        origen = OrigenCosto::Dinamico;
    }

    if let Some(override_) = solicitud.distrito_id.and_then(|d| config.distrito(d)) {
        if let Some(c) = override_.costo_envio {
            costo = c;
            origen = OrigenCosto::Distrito;
        }
        tiempo_min = override_.tiempo_entrega_min.unwrap_or(tiempo_min);
        tiempo_max = override_.tiempo_entrega_max.unwrap_or(tiempo_max);
    }

    if let Some(tarifa) = tarifa {
        tiempo_min += tarifa.tiempo_adicional_min;
        tiempo_max += tarifa.tiempo_adicional_min;
    }

    let mut aplicadas = Vec::new();
    for excepcion in &vigentes {
        match excepcion.tipo {
            TipoExcepcion::CostoEspecial => {
                if let Some(c) = excepcion.costo_envio {
                    costo = c;
                    origen = OrigenCosto::Excepcion;
                    aplicadas.push(excepcion.id);
                }
            }
            TipoExcepcion::TiempoEspecial => {
                tiempo_min = excepcion.tiempo_entrega_min.unwrap_or(tiempo_min);
                tiempo_max = excepcion.tiempo_entrega_max.unwrap_or(tiempo_max);
                aplicadas.push(excepcion.id);
            }
            TipoExcepcion::HorarioEspecial => aplicadas.push(excepcion.id),
            TipoExcepcion::NoDisponible => {}
        }
    }

    if let Some(minimo) = zona.pedido_minimo.filter(|m| solicitud.subtotal < *m) {
        return Err(RechazoCobertura::PedidoMinimoNoAlcanzado { minimo });
    }

    if zona
        .envio_gratis_desde
        .is_some_and(|umbral| solicitud.subtotal >= umbral)
    {
        costo = Decimal::ZERO;
        origen = OrigenCosto::EnvioGratis;
    }

    Ok(CotizacionEnvio {
        zona_reparto_id: zona.id,
        zona_nombre: zona.nombre.clone(),
        costo_envio: costo.max(Decimal::ZERO),
        tiempo_entrega_min: tiempo_min.min(tiempo_max),
        tiempo_entrega_max: tiempo_max.max(tiempo_min),
        distancia_km: distancia,
        origen_costo: origen,
        excepciones_aplicadas: aplicadas,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::reparto::zona::{
        CostoEnvioDinamico, ExcepcionZona, HorarioZona, ZonaDistrito, ZonaReparto,
    };
    use crate::types::{CostoEnvioDinamicoId, HorarioZonaId, ZonaDistritoId};
    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal_macros::dec;

    const CENTRO: Coordenadas = Coordenadas::new(-12.0464, -77.0428);

    fn at(h: u32, m: u32) -> NaiveDateTime {
        // Thursday
        NaiveDate::from_ymd_opt(2026, 10, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn config() -> ZonaConfig {
        let mut config = ZonaConfig::new(ZonaReparto {
            id: ZonaRepartoId::new(1),
            nombre: "Lima Centro".to_string(),
            descripcion: None,
            costo_envio_base: dec!(8.00),
            pedido_minimo: Some(dec!(20)),
            envio_gratis_desde: Some(dec!(200)),
            tiempo_entrega_min: 30,
            tiempo_entrega_max: 45,
            centro: Some(CENTRO),
            radio_cobertura_km: Some(12.0),
            prioridad: 1,
            activo: true,
        });
        config.tarifas = vec![
            CostoEnvioDinamico {
                id: CostoEnvioDinamicoId::new(1),
                zona_reparto_id: ZonaRepartoId::new(1),
                distancia_desde_km: 0.0,
                distancia_hasta_km: Some(3.0),
                costo_envio: dec!(5.00),
                tiempo_adicional_min: 0,
                activo: true,
            },
            CostoEnvioDinamico {
                id: CostoEnvioDinamicoId::new(2),
                zona_reparto_id: ZonaRepartoId::new(1),
                distancia_desde_km: 3.0,
                distancia_hasta_km: Some(12.0),
                costo_envio: dec!(12.00),
                tiempo_adicional_min: 15,
                activo: true,
            },
        ];
        config
    }

    fn excepcion(id: i32, tipo: TipoExcepcion) -> ExcepcionZona {
        ExcepcionZona {
            id: ExcepcionZonaId::new(id),
            zona_reparto_id: ZonaRepartoId::new(1),
            tipo,
            fecha_inicio: NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
            fecha_fin: NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
            hora_inicio: None,
            hora_fin: None,
            costo_envio: None,
            tiempo_entrega_min: None,
            tiempo_entrega_max: None,
            motivo: None,
            activo: true,
        }
    }

    fn solicitud(coords: Option<Coordenadas>, subtotal: Decimal) -> SolicitudEnvio {
        SolicitudEnvio {
            distrito_id: None,
            coordenadas: coords,
            subtotal,
            momento: at(12, 0),
        }
    }

    #[test]
    fn test_near_address_uses_first_tier() {
        let q = cotizar(&config(), &solicitud(Some(CENTRO), dec!(50))).unwrap();
        assert_eq!(q.costo_envio, dec!(5.00));
        assert_eq!(q.origen_costo, OrigenCosto::Dinamico);
        assert_eq!((q.tiempo_entrega_min, q.tiempo_entrega_max), (30, 45));
    }

    #[test]
    fn test_far_address_uses_second_tier_and_extra_time() {
        let miraflores = Coordenadas::new(-12.1211, -77.0297);
        let q = cotizar(&config(), &solicitud(Some(miraflores), dec!(50))).unwrap();
        assert_eq!(q.costo_envio, dec!(12.00));
        assert_eq!((q.tiempo_entrega_min, q.tiempo_entrega_max), (45, 60));
        assert_eq!(q.tiempo_entrega_texto(), "45-60 min");
    }

    #[test]
    fn test_no_tier_falls_back_to_base() {
        let mut c = config();
        c.tarifas.clear();
        let q = cotizar(&c, &solicitud(Some(CENTRO), dec!(50))).unwrap();
        assert_eq!(q.costo_envio, dec!(8.00));
        assert_eq!(q.origen_costo, OrigenCosto::Base);
    }

    #[test]
    fn test_outside_radius_is_rejected() {
        let callao = Coordenadas::new(-12.0566, -77.1181);
        let mut c = config();
        c.zona.radio_cobertura_km = Some(5.0);
        let err = cotizar(&c, &solicitud(Some(callao), dec!(50))).unwrap_err();
        assert!(matches!(
            err,
            RechazoCobertura::FueraDeCobertura {
                distancia_km: Some(_)
            }
        ));
    }

    #[test]
    fn test_distrito_override_beats_tier() {
        let mut c = config();
        c.distritos.push(ZonaDistrito {
            id: ZonaDistritoId::new(1),
            zona_reparto_id: ZonaRepartoId::new(1),
            distrito_id: DistritoId::new(10),
            costo_envio: Some(dec!(6.50)),
            tiempo_entrega_min: Some(20),
            tiempo_entrega_max: Some(30),
            activo: true,
        });
        let mut s = solicitud(Some(CENTRO), dec!(50));
        s.distrito_id = Some(DistritoId::new(10));
        let q = cotizar(&c, &s).unwrap();
        assert_eq!(q.costo_envio, dec!(6.50));
        assert_eq!(q.origen_costo, OrigenCosto::Distrito);
        assert_eq!((q.tiempo_entrega_min, q.tiempo_entrega_max), (20, 30));
    }

    #[test]
    fn test_distrito_without_coordinates() {
        let mut c = config();
        c.distritos.push(ZonaDistrito {
            id: ZonaDistritoId::new(1),
            zona_reparto_id: ZonaRepartoId::new(1),
            distrito_id: DistritoId::new(10),
            costo_envio: None,
            tiempo_entrega_min: None,
            tiempo_entrega_max: Some(60),
            activo: true,
        });
        let mut s = solicitud(None, dec!(50));
        s.distrito_id = Some(DistritoId::new(10));
        let q = cotizar(&c, &s).unwrap();
        assert_eq!(q.costo_envio, dec!(8.00));
        assert_eq!(q.distancia_km, None);
        assert_eq!((q.tiempo_entrega_min, q.tiempo_entrega_max), (30, 60));
    }

    #[test]
    fn test_holiday_closes_zone() {
        let mut c = config();
        let mut feriado = excepcion(1, TipoExcepcion::NoDisponible);
        feriado.motivo = Some("Feriado".to_string());
        c.excepciones.push(feriado);
        let err = cotizar(&c, &solicitud(Some(CENTRO), dec!(50))).unwrap_err();
        assert_eq!(
            err,
            RechazoCobertura::NoDisponible {
                motivo: Some("Feriado".to_string())
            }
        );
        assert_eq!(err.to_string(), "zona no disponible: Feriado");
    }

    #[test]
    fn test_special_cost_and_time_exceptions() {
        let mut c = config();
        let mut costo = excepcion(1, TipoExcepcion::CostoEspecial);
        costo.costo_envio = Some(dec!(15));
        let mut tiempo = excepcion(2, TipoExcepcion::TiempoEspecial);
        tiempo.tiempo_entrega_min = Some(60);
        tiempo.tiempo_entrega_max = Some(120);
        c.excepciones = vec![tiempo, costo];

        let q = cotizar(&c, &solicitud(Some(CENTRO), dec!(50))).unwrap();
        assert_eq!(q.costo_envio, dec!(15));
        assert_eq!(q.origen_costo, OrigenCosto::Excepcion);
        assert_eq!(q.tiempo_entrega_texto(), "1-2 h");
        assert_eq!(
            q.excepciones_aplicadas,
            vec![ExcepcionZonaId::new(1), ExcepcionZonaId::new(2)]
        );
    }

    #[test]
    fn test_exception_outside_its_hour_window_is_ignored() {
        let mut c = config();
        let mut noche = excepcion(1, TipoExcepcion::NoDisponible);
        noche.hora_inicio = Some(NaiveTime::from_hms_opt(20, 0, 0).unwrap());
        c.excepciones.push(noche);
        assert!(cotizar(&c, &solicitud(Some(CENTRO), dec!(50))).is_ok());
    }

    #[test]
    fn test_closed_outside_schedule() {
        let mut c = config();
        c.horarios.push(HorarioZona {
            id: HorarioZonaId::new(1),
            zona_reparto_id: ZonaRepartoId::new(1),
            dia_semana: 4,
            hora_inicio: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            hora_fin: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            activo: true,
        });
        let err = cotizar(&c, &solicitud(Some(CENTRO), dec!(50))).unwrap_err();
        assert_eq!(err, RechazoCobertura::FueraDeHorario);
    }

    #[test]
    fn test_closure_date_reported_even_outside_schedule() {
        let mut c = config();
        c.horarios.push(HorarioZona {
            id: HorarioZonaId::new(1),
            zona_reparto_id: ZonaRepartoId::new(1),
            dia_semana: 4,
            hora_inicio: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            hora_fin: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            activo: true,
        });
        let mut cierre = excepcion(1, TipoExcepcion::NoDisponible);
        cierre.motivo = Some("Inventario".to_string());
        c.excepciones.push(cierre);

        let err = cotizar(&c, &solicitud(Some(CENTRO), dec!(50))).unwrap_err();
        assert_eq!(
            err,
            RechazoCobertura::NoDisponible {
                motivo: Some("Inventario".to_string())
            }
        );
    }

    #[test]
    fn test_cost_precedence() {
        let mut c = config();
        c.distritos.push(ZonaDistrito {
            id: ZonaDistritoId::new(1),
            zona_reparto_id: ZonaRepartoId::new(1),
            distrito_id: DistritoId::new(10),
            costo_envio: Some(dec!(6.50)),
            tiempo_entrega_min: None,
            tiempo_entrega_max: None,
            activo: true,
        });
        let mut s = solicitud(Some(CENTRO), dec!(50));
        s.distrito_id = Some(DistritoId::new(10));
        assert_eq!(cotizar(&c, &s).unwrap().origen_costo, OrigenCosto::Distrito);

        let mut especial = excepcion(1, TipoExcepcion::CostoEspecial);
        especial.costo_envio = Some(dec!(3.00));
        c.excepciones.push(especial);
        let q = cotizar(&c, &s).unwrap();
        assert_eq!(q.costo_envio, dec!(3.00));
        assert_eq!(q.origen_costo, OrigenCosto::Excepcion);

        s.subtotal = dec!(200);
        let q = cotizar(&c, &s).unwrap();
        assert!(q.es_gratis());
        assert_eq!(q.origen_costo, OrigenCosto::EnvioGratis);
    }

    #[test]
    fn test_minimum_order() {
        let err = cotizar(&config(), &solicitud(Some(CENTRO), dec!(19.99))).unwrap_err();
        assert_eq!(
            err,
            RechazoCobertura::PedidoMinimoNoAlcanzado { minimo: dec!(20) }
        );
        assert_eq!(err.to_string(), "el pedido mínimo para esta zona es S/ 20.00");
    }

    #[test]
    fn test_free_shipping_threshold_is_inclusive() {
        let q = cotizar(&config(), &solicitud(Some(CENTRO), dec!(200))).unwrap();
        assert!(q.es_gratis());
        assert_eq!(q.origen_costo, OrigenCosto::EnvioGratis);
        assert_eq!(q.costo_envio_formateado(), "S/ 0.00");
    }

    #[test]
    fn test_inactive_zone() {
        let mut c = config();
        c.zona.activo = false;
        assert_eq!(
            cotizar(&c, &solicitud(Some(CENTRO), dec!(50))).unwrap_err(),
            RechazoCobertura::ZonaInactiva
        );
    }

    #[test]
    fn test_resolver_prefers_distrito_then_priority_then_distance() {
        let mut a = config();
        a.zona.id = ZonaRepartoId::new(1);
        a.zona.prioridad = 5;
        let mut b = config();
        b.zona.id = ZonaRepartoId::new(2);
        b.zona.prioridad = 1;
        let mut c = config();
        c.zona.id = ZonaRepartoId::new(3);
        c.zona.prioridad = 9;
        c.distritos.push(ZonaDistrito {
            id: ZonaDistritoId::new(1),
            zona_reparto_id: ZonaRepartoId::new(3),
            distrito_id: DistritoId::new(10),
            costo_envio: None,
            tiempo_entrega_min: None,
            tiempo_entrega_max: None,
            activo: true,
        });
        let zonas = vec![a, b, c];

        let s = solicitud(Some(CENTRO), dec!(50));
        assert_eq!(
            resolver_zona(&zonas, &s).map(|z| z.zona.id),
            Some(ZonaRepartoId::new(2))
        );

        let mut s = s;
        s.distrito_id = Some(DistritoId::new(10));
        assert_eq!(
            resolver_zona(&zonas, &s).map(|z| z.zona.id),
            Some(ZonaRepartoId::new(3))
        );
    }

    #[test]
    fn test_resolver_breaks_ties_by_distance() {
        let mut cerca = config();
        cerca.zona.id = ZonaRepartoId::new(1);
        let mut lejos = config();
        lejos.zona.id = ZonaRepartoId::new(2);
        lejos.zona.centro = Some(Coordenadas::new(-12.08, -77.05));
        let zonas = vec![lejos, cerca];

        let q = cotizar_mejor(&zonas, &solicitud(Some(CENTRO), dec!(50))).unwrap();
        assert_eq!(q.zona_reparto_id, ZonaRepartoId::new(1));
    }

    #[test]
    fn test_cotizar_mejor_without_zone() {
        let zonas: Vec<ZonaConfig> = Vec::new();
        assert_eq!(
            cotizar_mejor(&zonas, &solicitud(Some(CENTRO), dec!(50))).unwrap_err(),
            RechazoCobertura::SinZona
        );
    }

    #[test]
    fn test_tiempo_entrega_texto() {
        assert_eq!(tiempo_entrega_texto(30, 45), "30-45 min");
        assert_eq!(tiempo_entrega_texto(45, 45), "45 min");
        assert_eq!(tiempo_entrega_texto(60, 120), "1-2 h");
        assert_eq!(tiempo_entrega_texto(120, 120), "2 h");
        assert_eq!(tiempo_entrega_texto(60, 90), "60-90 min");
        assert_eq!(tiempo_entrega_texto(45, 30), "30-45 min");
    }

    #[test]
    fn test_ventana_entrega() {
        let q = cotizar(&config(), &solicitud(Some(CENTRO), dec!(50))).unwrap();
        let (desde, hasta) = ventana_entrega(at(12, 0), &q);
        assert_eq!(desde, at(12, 30));
        assert_eq!(hasta, at(12, 45));
    }
}
