use serde::Serialize;

use super::correcao::permite_categoria;
use super::{valor_categoria, valor_numerico, BancoEleitores, IDADE, IDADE_MAXIMA, IDADE_MINIMA};
use crate::config::loader::Restricao;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Violacao {
    pub indice: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub motivo: String,
}

impl BancoEleitores {
    /// Checks voting age bounds and every conditional age constraint.
    pub fn validar(&self, restricoes: &[Restricao]) -> Vec<Violacao> {
        let mut violacoes = Vec::new();

        for (indice, registro) in self.registros().iter().enumerate() {
            let id = registro.get("id").map(|v| match v.as_str() {
                Some(s) => s.to_string(),
                None => v.to_string(),
            });
            let mut violar = |motivo: String| {
                violacoes.push(Violacao {
                    indice,
                    id: id.clone(),
                    motivo,
                })
            };

            match valor_numerico(registro, IDADE) {
                None => violar("idade ausente ou não numérica".to_string()),
                Some(idade) if !(IDADE_MINIMA..=IDADE_MAXIMA).contains(&idade) => violar(format!(
                    "idade {} fora do intervalo {}-{}",
                    idade, IDADE_MINIMA, IDADE_MAXIMA
                )),
                Some(_) => {}
            }

            for restricao in restricoes {
                let valor = valor_categoria(registro, &restricao.atributo);
                if valor == restricao.valor
                    && !permite_categoria(registro, &restricao.atributo, &valor, std::slice::from_ref(restricao))
                {
                    violar(format!(
                        "{}={} exige idade entre {} e {}",
                        restricao.atributo,
                        restricao.valor,
                        restricao.idade_minima.map_or("-".to_string(), |v| v.to_string()),
                        restricao.idade_maxima.map_or("-".to_string(), |v| v.to_string()),
                    ));
                }
            }
        }

        violacoes
    }
}
