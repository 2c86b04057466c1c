//! Delivery zone request bodies.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::Deserialize;

use tienda_core::reparto::{Coordenadas, SolicitudEnvio};
use tienda_core::{DistritoId, TipoExcepcion, ZonaRepartoId};

use super::catalogo::validar_monto;
use super::cliente::validar_coordenadas;
use super::texto_opcional;
use crate::error::{AppError, ValidationErrors};

/// Body of `POST /api/envio/cotizar`.
#[derive(Debug, Clone, Deserialize)]
pub struct CotizarInput {
    pub distrito_id: Option<DistritoId>,
    pub latitud: Option<f64>,
    pub longitud: Option<f64>,
    #[serde(default)]
    pub subtotal: Decimal,
    /// Quote a specific zone instead of resolving the best one.
    pub zona_reparto_id: Option<ZonaRepartoId>,
}

impl CotizarInput {
    /// Validate the input.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] listing every invalid field.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = ValidationErrors::new();
        errors.check(
            self.distrito_id.is_some() || self.latitud.is_some() || self.longitud.is_some(),
            "distrito_id",
            "indique el distrito o las coordenadas",
        );
        validar_coordenadas(&mut errors, self.latitud, self.longitud);
        validar_monto(&mut errors, "subtotal", self.subtotal);
        errors.into_result()
    }

    /// Quote request at local time `momento`.
    #[must_use]
    pub const fn solicitud(&self, momento: NaiveDateTime) -> SolicitudEnvio {
        SolicitudEnvio {
            distrito_id: self.distrito_id,
            coordenadas: Coordenadas::from_columns(self.latitud, self.longitud),
            subtotal: self.subtotal,
            momento,
        }
    }
}

/// A distrito override inside a [`ZonaInput`].
#[derive(Debug, Clone, Deserialize)]
pub struct ZonaDistritoInput {
    pub distrito_id: DistritoId,
    pub costo_envio: Option<Decimal>,
    pub tiempo_entrega_min: Option<i32>,
    pub tiempo_entrega_max: Option<i32>,
}

/// A distance tier inside a [`ZonaInput`].
#[derive(Debug, Clone, Deserialize)]
pub struct TarifaInput {
    pub distancia_desde_km: f64,
    pub distancia_hasta_km: Option<f64>,
    pub costo_envio: Decimal,
    #[serde(default)]
    pub tiempo_adicional_min: i32,
}

/// Weekly opening hours inside a [`ZonaInput`].
#[derive(Debug, Clone, Deserialize)]
pub struct HorarioInput {
    pub dia_semana: i16,
    pub hora_inicio: NaiveTime,
    pub hora_fin: NaiveTime,
}

/// Body of `POST /api/zonas` and `PUT /api/zonas/{id}`.
///
/// On update the distrito, tier and schedule lists replace the stored ones.
#[derive(Debug, Clone, Deserialize)]
pub struct ZonaInput {
    pub nombre: String,
    pub descripcion: Option<String>,
    pub costo_envio_base: Decimal,
    pub pedido_minimo: Option<Decimal>,
    pub envio_gratis_desde: Option<Decimal>,
    pub tiempo_entrega_min: i32,
    pub tiempo_entrega_max: i32,
    pub latitud_centro: Option<f64>,
    pub longitud_centro: Option<f64>,
    pub radio_cobertura_km: Option<f64>,
    #[serde(default)]
    pub prioridad: i32,
    #[serde(default = "activa_por_defecto")]
    pub activo: bool,
    #[serde(default)]
    pub distritos: Vec<ZonaDistritoInput>,
    #[serde(default)]
    pub tarifas: Vec<TarifaInput>,
    #[serde(default)]
    pub horarios: Vec<HorarioInput>,
}

const fn activa_por_defecto() -> bool {
    true
}

impl ZonaInput {
    /// Validate the input.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] listing every invalid field.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = ValidationErrors::new();
        errors.check(!self.nombre.trim().is_empty(), "nombre", "el nombre es obligatorio");
        validar_monto(&mut errors, "costo_envio_base", self.costo_envio_base);
        if let Some(minimo) = self.pedido_minimo {
            validar_monto(&mut errors, "pedido_minimo", minimo);
        }
        if let Some(umbral) = self.envio_gratis_desde {
            validar_monto(&mut errors, "envio_gratis_desde", umbral);
        }
        validar_ventana(
            &mut errors,
            "tiempo_entrega",
            Some(self.tiempo_entrega_min),
            Some(self.tiempo_entrega_max),
        );
        validar_coordenadas(&mut errors, self.latitud_centro, self.longitud_centro);
        if let Some(radio) = self.radio_cobertura_km {
            errors.check(
                radio.is_finite() && radio > 0.0,
                "radio_cobertura_km",
                "el radio debe ser mayor a cero",
            );
            errors.check(
                self.latitud_centro.is_some(),
                "radio_cobertura_km",
                "el radio requiere el centro de la zona",
            );
        }

        for (i, distrito) in self.distritos.iter().enumerate() {
            if let Some(costo) = distrito.costo_envio {
                validar_monto(&mut errors, &format!("distritos.{i}.costo_envio"), costo);
            }
            validar_ventana(
                &mut errors,
                &format!("distritos.{i}.tiempo_entrega"),
                distrito.tiempo_entrega_min,
                distrito.tiempo_entrega_max,
            );
        }
        let mut repetidos: Vec<_> = self.distritos.iter().map(|d| d.distrito_id).collect();
        repetidos.sort_unstable();
        repetidos.dedup();
        errors.check(
            repetidos.len() == self.distritos.len(),
            "distritos",
            "un distrito solo puede figurar una vez",
        );

        for (i, tarifa) in self.tarifas.iter().enumerate() {
            let field = format!("tarifas.{i}");
            errors.check(
                tarifa.distancia_desde_km.is_finite() && tarifa.distancia_desde_km >= 0.0,
                &field,
                "la distancia inicial no puede ser negativa",
            );
            if let Some(hasta) = tarifa.distancia_hasta_km {
                errors.check(
                    hasta > tarifa.distancia_desde_km,
                    &field,
                    "la distancia final debe superar a la inicial",
                );
            }
            validar_monto(&mut errors, &format!("{field}.costo_envio"), tarifa.costo_envio);
            errors.check(
                tarifa.tiempo_adicional_min >= 0,
                &format!("{field}.tiempo_adicional_min"),
                "el tiempo adicional no puede ser negativo",
            );
        }

        for (i, horario) in self.horarios.iter().enumerate() {
            let field = format!("horarios.{i}");
            errors.check(
                (0..=6).contains(&horario.dia_semana),
                &format!("{field}.dia_semana"),
                "el día debe estar entre 0 (domingo) y 6 (sábado)",
            );
            errors.check(
                horario.hora_inicio < horario.hora_fin,
                &field,
                "la hora de inicio debe ser anterior a la hora de fin",
            );
        }

        errors.into_result()
    }

    #[must_use]
    pub fn descripcion(&self) -> Option<String> {
        texto_opcional(self.descripcion.as_deref())
    }
}

/// Body of `POST /api/zonas/{id}/excepciones`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExcepcionInput {
    pub tipo: TipoExcepcion,
    pub fecha_inicio: NaiveDate,
    pub fecha_fin: NaiveDate,
    pub hora_inicio: Option<NaiveTime>,
    pub hora_fin: Option<NaiveTime>,
    pub costo_envio: Option<Decimal>,
    pub tiempo_entrega_min: Option<i32>,
    pub tiempo_entrega_max: Option<i32>,
    pub motivo: Option<String>,
}

impl ExcepcionInput {
    /// Validate the input. Each kind requires the fields it overrides.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] listing every invalid field.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = ValidationErrors::new();
        errors.check(
            self.fecha_fin >= self.fecha_inicio,
            "fecha_fin",
            "la fecha final no puede ser anterior a la inicial",
        );
        if let (Some(inicio), Some(fin)) = (self.hora_inicio, self.hora_fin) {
            errors.check(
                inicio < fin,
                "hora_fin",
                "la hora final debe ser posterior a la inicial",
            );
        }

        match self.tipo {
            TipoExcepcion::CostoEspecial => match self.costo_envio {
                Some(costo) => validar_monto(&mut errors, "costo_envio", costo),
                None => errors.add("costo_envio", "indique el costo especial"),
            },
            TipoExcepcion::TiempoEspecial => {
                errors.check(
                    self.tiempo_entrega_min.is_some() || self.tiempo_entrega_max.is_some(),
                    "tiempo_entrega_min",
                    "indique el tiempo de entrega especial",
                );
                validar_ventana(
                    &mut errors,
                    "tiempo_entrega",
                    self.tiempo_entrega_min,
                    self.tiempo_entrega_max,
                );
            }
            TipoExcepcion::HorarioEspecial => errors.check(
                self.hora_inicio.is_some() && self.hora_fin.is_some(),
                "hora_inicio",
                "el horario especial requiere hora de inicio y de fin",
            ),
            TipoExcepcion::NoDisponible => {}
        }
        errors.into_result()
    }

    #[must_use]
    pub fn motivo(&self) -> Option<String> {
        texto_opcional(self.motivo.as_deref())
    }
}

/// Delivery window bounds are non-negative and ordered.
fn validar_ventana(errors: &mut ValidationErrors, field: &str, min: Option<i32>, max: Option<i32>) {
    if min.is_some_and(|m| m < 0) || max.is_some_and(|m| m < 0) {
        errors.add(field, "el tiempo de entrega no puede ser negativo");
    }
    if let (Some(min), Some(max)) = (min, max) {
        errors.check(
            min <= max,
            field,
            "el tiempo mínimo no puede superar al máximo",
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn validation(err: AppError) -> ValidationErrors {
        match err {
            AppError::Validation(errors) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    fn zona_input() -> ZonaInput {
        ZonaInput {
            nombre: "Miraflores".to_string(),
            descripcion: None,
            costo_envio_base: dec!(7),
            pedido_minimo: Some(dec!(25)),
            envio_gratis_desde: Some(dec!(120)),
            tiempo_entrega_min: 30,
            tiempo_entrega_max: 50,
            latitud_centro: Some(-12.1211),
            longitud_centro: Some(-77.0297),
            radio_cobertura_km: Some(4.0),
            prioridad: 1,
            activo: true,
            distritos: vec![ZonaDistritoInput {
                distrito_id: DistritoId::new(15),
                costo_envio: Some(dec!(5)),
                tiempo_entrega_min: None,
                tiempo_entrega_max: None,
            }],
            tarifas: vec![TarifaInput {
                distancia_desde_km: 0.0,
                distancia_hasta_km: Some(2.5),
                costo_envio: dec!(5),
                tiempo_adicional_min: 0,
            }],
            horarios: vec![HorarioInput {
                dia_semana: 1,
                hora_inicio: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                hora_fin: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            }],
        }
    }

    #[test]
    fn test_cotizar_needs_a_location() {
        let input = CotizarInput {
            distrito_id: None,
            latitud: None,
            longitud: None,
            subtotal: dec!(50),
            zona_reparto_id: None,
        };
        assert!(validation(input.validate().unwrap_err()).get("distrito_id").is_some());
    }

    #[test]
    fn test_cotizar_builds_request() {
        let input = CotizarInput {
            distrito_id: Some(DistritoId::new(15)),
            latitud: Some(-12.12),
            longitud: Some(-77.03),
            subtotal: dec!(50),
            zona_reparto_id: None,
        };
        assert!(input.validate().is_ok());
        let momento = NaiveDate::from_ymd_opt(2026, 10, 15)
            .unwrap()
            .and_hms_opt(13, 0, 0)
            .unwrap();
        let solicitud = input.solicitud(momento);
        assert_eq!(solicitud.coordenadas, Some(Coordenadas::new(-12.12, -77.03)));
        assert_eq!(solicitud.subtotal, dec!(50));
    }

    #[test]
    fn test_zona_input_valid() {
        assert!(zona_input().validate().is_ok());
    }

    #[test]
    fn test_zona_input_rejects_bad_children() {
        let mut input = zona_input();
        input.tiempo_entrega_min = 60;
        input.tarifas[0].distancia_hasta_km = Some(0.0);
        input.horarios[0].dia_semana = 7;
        input.distritos.push(input.distritos[0].clone());
        let errors = validation(input.validate().unwrap_err());
        assert!(errors.get("tiempo_entrega").is_some());
        assert!(errors.get("tarifas.0").is_some());
        assert!(errors.get("horarios.0.dia_semana").is_some());
        assert!(errors.get("distritos").is_some());
    }

    #[test]
    fn test_radius_requires_centre() {
        let mut input = zona_input();
        input.latitud_centro = None;
        input.longitud_centro = None;
        let errors = validation(input.validate().unwrap_err());
        assert_eq!(
            errors.get("radio_cobertura_km").unwrap(),
            ["el radio requiere el centro de la zona"]
        );
    }

    #[test]
    fn test_excepcion_requires_its_override() {
        let fecha = NaiveDate::from_ymd_opt(2026, 12, 25).unwrap();
        let input = ExcepcionInput {
            tipo: TipoExcepcion::CostoEspecial,
            fecha_inicio: fecha,
            fecha_fin: fecha,
            hora_inicio: None,
            hora_fin: None,
            costo_envio: None,
            tiempo_entrega_min: None,
            tiempo_entrega_max: None,
            motivo: Some("Navidad".to_string()),
        };
        assert!(validation(input.clone().validate().unwrap_err()).get("costo_envio").is_some());

        let input = ExcepcionInput {
            tipo: TipoExcepcion::NoDisponible,
            fecha_fin: fecha.pred_opt().unwrap(),
            ..input
        };
        assert!(validation(input.validate().unwrap_err()).get("fecha_fin").is_some());
    }
}
