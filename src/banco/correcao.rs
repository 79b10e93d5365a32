//! Distribution correction
//!
//! Rebalances the voter bank towards the targets of a [`CorrectionPlan`].
//! Each attribute is corrected independently: target counts are derived with
//! the largest-remainder method, and only as many records as needed are moved
//! out of over-represented categories into under-represented ones. Records are
//! picked in an order drawn from a seeded [`StdRng`], so the same bank, plan
//! and seed always produce the same output. Running a plan on a bank it has
//! already corrected changes nothing.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::distribuicao::{faixa_do_registro, RelatorioAtributo, FORA_DAS_FAIXAS};
use super::{valor_categoria, valor_numerico, BancoEleitores, Registro, IDADE, IDADE_MAXIMA, IDADE_MINIMA};
use crate::config::loader::{AlvoCategorico, AlvoFaixas, CorrectionPlan, Faixa, Restricao};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Alteracao {
    pub indice: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub de: Value,
    pub para: Value,
}

/// Target category that could not be filled because no eligible record was left.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Pendencia {
    pub categoria: String,
    pub faltando: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Correcao {
    pub atributo: String,
    pub dentro_tolerancia: bool,
    pub alteracoes: Vec<Alteracao>,
    pub pendencias: Vec<Pendencia>,
}

impl Correcao {
    fn nenhuma(atributo: &str) -> Self {
        Self {
            atributo: atributo.to_string(),
            dentro_tolerancia: true,
            alteracoes: Vec::new(),
            pendencias: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RelatorioCorrecao {
    pub semente: u64,
    pub total_registros: usize,
    pub hash_antes: String,
    pub hash_depois: String,
    pub antes: Vec<RelatorioAtributo>,
    pub depois: Vec<RelatorioAtributo>,
    pub correcoes: Vec<Correcao>,
}

impl RelatorioCorrecao {
    pub fn total_alteracoes(&self) -> usize {
        self.correcoes.iter().map(|c| c.alteracoes.len()).sum()
    }

    pub fn alterado(&self) -> bool {
        self.hash_antes != self.hash_depois
    }
}

/// Splits `total` records across `percentuais` with the largest-remainder method.
///
/// The result always sums to `total` (unless every percentage is zero); ties on
/// the fractional part go to the earlier category.
pub fn contagens_alvo(total: usize, percentuais: &[f64]) -> Vec<usize> {
    let soma: f64 = percentuais.iter().sum();
    if soma <= 0.0 {
        return vec![0; percentuais.len()];
    }

    let quotas: Vec<f64> = percentuais
        .iter()
        .map(|p| p / soma * total as f64)
        .collect();
    let mut contagens: Vec<usize> = quotas.iter().map(|q| q.floor() as usize).collect();

    let atribuidos: usize = contagens.iter().sum();
    let mut ordem: Vec<usize> = (0..quotas.len()).collect();
    ordem.sort_by(|&a, &b| {
        let fa = quotas[a] - quotas[a].floor();
        let fb = quotas[b] - quotas[b].floor();
        fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal).then(a.cmp(&b))
    });
    for &i in ordem.iter().take(total.saturating_sub(atribuidos)) {
        contagens[i] += 1;
    }
    contagens
}

fn id_do_registro(registro: &Registro) -> Option<String> {
    match registro.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// JSON value for a record moved into `destino`: an existing member's value when there is one,
/// otherwise `destino` in the type of the record's previous value.
fn valor_destino(destino: &str, exemplo: Option<&Value>, anterior: &Value) -> Value {
    if let Some(exemplo) = exemplo {
        return exemplo.clone();
    }
    let tipado = match anterior {
        Value::Number(_) => destino
            .parse::<i64>()
            .map(Value::from)
            .ok()
            .or_else(|| {
                destino
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
            }),
        Value::Bool(_) => destino.parse::<bool>().ok().map(Value::Bool),
        _ => None,
    };
    tipado.unwrap_or_else(|| Value::String(destino.to_string()))
}

/// Whether `registro` may take `valor` for `atributo` under the plan's age constraints.
pub fn permite_categoria(registro: &Registro, atributo: &str, valor: &str, restricoes: &[Restricao]) -> bool {
    let aplicaveis: Vec<&Restricao> = restricoes
        .iter()
        .filter(|r| r.atributo == atributo && r.valor == valor)
        .collect();
    if aplicaveis.is_empty() {
        return true;
    }
    match valor_numerico(registro, IDADE) {
        Some(idade) => aplicaveis.iter().all(|r| r.idade_permitida(idade)),
        None => false,
    }
}

/// Range of values `registro` may take inside `faixa`, or `None` when the constraints exclude it.
pub fn intervalo_permitido(
    registro: &Registro,
    atributo: &str,
    faixa: &Faixa,
    restricoes: &[Restricao],
) -> Option<(i64, i64)> {
    let (mut min, mut max) = (faixa.min, faixa.max);
    if atributo == IDADE {
        min = min.max(IDADE_MINIMA);
        max = max.min(IDADE_MAXIMA);
        for restricao in restricoes {
            if valor_categoria(registro, &restricao.atributo) != restricao.valor {
                continue;
            }
            if let Some(m) = restricao.idade_minima {
                min = min.max(m);
            }
            if let Some(m) = restricao.idade_maxima {
                max = max.min(m);
            }
        }
    }
    (min <= max).then_some((min, max))
}

/// Records of one over-represented category still available to move.
struct Sobra<K> {
    categoria: K,
    excesso: usize,
    candidatos: Vec<usize>,
}

/// Picks a record from the category with the most excess that `elegivel` accepts.
fn escolher<K>(sobras: &mut [Sobra<K>], elegivel: impl Fn(usize) -> bool) -> Option<(usize, usize)> {
    let mut ordem: Vec<usize> = (0..sobras.len()).filter(|&s| sobras[s].excesso > 0).collect();
    ordem.sort_by(|&a, &b| sobras[b].excesso.cmp(&sobras[a].excesso).then(a.cmp(&b)));

    for s in ordem {
        if let Some(pos) = sobras[s].candidatos.iter().position(|&i| elegivel(i)) {
            let indice = sobras[s].candidatos.remove(pos);
            sobras[s].excesso -= 1;
            return Some((s, indice));
        }
    }
    None
}

impl BancoEleitores {
    /// Moves the fewest records needed so `alvo.atributo` matches its target shares.
    pub fn corrigir_categorico(
        &mut self,
        alvo: &AlvoCategorico,
        restricoes: &[Restricao],
        tolerancia: f64,
        rng: &mut StdRng,
    ) -> Correcao {
        let atributo = alvo.atributo.as_str();
        if self.relatorio_categorico(alvo, tolerancia).dentro_tolerancia {
            debug!("{} already within tolerance", atributo);
            return Correcao::nenhuma(atributo);
        }

        let categorias: Vec<&String> = alvo.alvos.keys().collect();
        let percentuais: Vec<f64> = alvo.alvos.values().copied().collect();
        let alvo_n = contagens_alvo(self.len(), &percentuais);
        let alvo_de = |categoria: &str| {
            categorias
                .iter()
                .position(|c| c.as_str() == categoria)
                .map_or(0, |p| alvo_n[p])
        };

        let mut membros: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, registro) in self.registros.iter().enumerate() {
            membros.entry(valor_categoria(registro, atributo)).or_default().push(i);
        }

        let deficits: Vec<(String, usize)> = categorias
            .iter()
            .zip(&alvo_n)
            .filter_map(|(categoria, &n)| {
                let atual = membros.get(categoria.as_str()).map_or(0, Vec::len);
                (atual < n).then(|| ((*categoria).clone(), n - atual))
            })
            .collect();

        // Moved records copy the JSON value already used for the destination category.
        let exemplos: BTreeMap<String, Value> = membros
            .iter()
            .map(|(categoria, indices)| {
                let valor = self.registros[indices[0]].get(atributo).cloned().unwrap_or(Value::Null);
                (categoria.clone(), valor)
            })
            .collect();

        let mut sobras = Vec::new();
        for (categoria, mut candidatos) in membros {
            let n = alvo_de(&categoria);
            if candidatos.len() > n {
                candidatos.shuffle(rng);
                sobras.push(Sobra {
                    excesso: candidatos.len() - n,
                    categoria,
                    candidatos,
                });
            }
        }

        let mut correcao = Correcao {
            atributo: atributo.to_string(),
            dentro_tolerancia: false,
            alteracoes: Vec::new(),
            pendencias: Vec::new(),
        };

        for (destino, falta) in deficits {
            let mut restante = falta;
            while restante > 0 {
                let registros = &self.registros;
                let escolhido = escolher(&mut sobras, |i| {
                    permite_categoria(&registros[i], atributo, &destino, restricoes)
                });
                let Some((s, indice)) = escolhido else {
                    break;
                };

                let registro = &mut self.registros[indice];
                let anterior = registro.get(atributo).cloned().unwrap_or(Value::Null);
                let para = valor_destino(&destino, exemplos.get(&destino), &anterior);
                registro.insert(atributo.to_string(), para.clone());
                debug!("{}[{}]: {} -> {}", atributo, indice, sobras[s].categoria, destino);

                correcao.alteracoes.push(Alteracao {
                    indice,
                    id: id_do_registro(registro),
                    de: anterior,
                    para,
                });
                restante -= 1;
            }

            if restante > 0 {
                warn!(
                    "{}: {} record(s) short of target for '{}', constraints exclude the remaining candidates",
                    atributo, restante, destino
                );
                correcao.pendencias.push(Pendencia {
                    categoria: destino,
                    faltando: restante,
                });
            }
        }

        info!("{}: {} record(s) changed", atributo, correcao.alteracoes.len());
        correcao
    }

    /// Moves records between bands of a numeric attribute, drawing a new value inside the destination band.
    pub fn corrigir_faixas(
        &mut self,
        alvo: &AlvoFaixas,
        restricoes: &[Restricao],
        tolerancia: f64,
        rng: &mut StdRng,
    ) -> Correcao {
        let atributo = alvo.atributo.as_str();
        if self.relatorio_faixas(alvo, tolerancia).dentro_tolerancia {
            debug!("{} already within tolerance", atributo);
            return Correcao::nenhuma(atributo);
        }

        let percentuais: Vec<f64> = alvo.faixas.iter().map(|f| f.percentual).collect();
        let alvo_n = contagens_alvo(self.len(), &percentuais);

        let mut membros: BTreeMap<Option<usize>, Vec<usize>> = BTreeMap::new();
        for (i, registro) in self.registros.iter().enumerate() {
            membros
                .entry(faixa_do_registro(registro, atributo, &alvo.faixas))
                .or_default()
                .push(i);
        }

        let deficits: Vec<(usize, usize)> = alvo_n
            .iter()
            .enumerate()
            .filter_map(|(b, &n)| {
                let atual = membros.get(&Some(b)).map_or(0, Vec::len);
                (atual < n).then_some((b, n - atual))
            })
            .collect();

        let mut sobras = Vec::new();
        for (faixa, mut candidatos) in membros {
            let n = faixa.map_or(0, |b| alvo_n[b]);
            if candidatos.len() > n {
                candidatos.shuffle(rng);
                sobras.push(Sobra {
                    excesso: candidatos.len() - n,
                    categoria: faixa,
                    candidatos,
                });
            }
        }

        let mut correcao = Correcao {
            atributo: atributo.to_string(),
            dentro_tolerancia: false,
            alteracoes: Vec::new(),
            pendencias: Vec::new(),
        };

        for (b, falta) in deficits {
            let destino = &alvo.faixas[b];
            let mut restante = falta;
            while restante > 0 {
                let registros = &self.registros;
                let escolhido = escolher(&mut sobras, |i| {
                    intervalo_permitido(&registros[i], atributo, destino, restricoes).is_some()
                });
                let Some((s, indice)) = escolhido else {
                    break;
                };
                let Some((min, max)) = intervalo_permitido(&self.registros[indice], atributo, destino, restricoes)
                else {
                    break;
                };

                let novo = Value::from(rng.gen_range(min..=max));
                let registro = &mut self.registros[indice];
                let anterior = registro.get(atributo).cloned().unwrap_or(Value::Null);
                registro.insert(atributo.to_string(), novo.clone());
                debug!(
                    "{}[{}]: {} -> {} ({})",
                    atributo,
                    indice,
                    sobras[s].categoria.map_or(FORA_DAS_FAIXAS.to_string(), |o| alvo.faixas[o].rotulo()),
                    destino.rotulo(),
                    novo
                );

                correcao.alteracoes.push(Alteracao {
                    indice,
                    id: id_do_registro(registro),
                    de: anterior,
                    para: novo,
                });
                restante -= 1;
            }

            if restante > 0 {
                warn!(
                    "{}: {} record(s) short of target for band {}",
                    atributo,
                    restante,
                    destino.rotulo()
                );
                correcao.pendencias.push(Pendencia {
                    categoria: destino.rotulo(),
                    faltando: restante,
                });
            }
        }

        info!("{}: {} record(s) changed", atributo, correcao.alteracoes.len());
        correcao
    }

    /// Applies every target of `plano`, bands first, and reports the before/after state.
    ///
    /// `semente` overrides the plan's seed; with neither, a random seed is drawn and reported.
    pub fn aplicar_plano(&mut self, plano: &CorrectionPlan, semente: Option<u64>) -> RelatorioCorrecao {
        let semente = semente.or(plano.semente).unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(semente);
        info!("Applying correction plan to {} records (seed {})", self.len(), semente);

        let hash_antes = self.content_hash();
        let antes = self.relatorio(plano);

        let mut correcoes = Vec::new();
        for alvo in &plano.faixas {
            let tolerancia = plano.tolerancia_para(alvo.tolerancia);
            correcoes.push(self.corrigir_faixas(alvo, &plano.restricoes, tolerancia, &mut rng));
        }
        for alvo in &plano.categoricos {
            let tolerancia = plano.tolerancia_para(alvo.tolerancia);
            correcoes.push(self.corrigir_categorico(alvo, &plano.restricoes, tolerancia, &mut rng));
        }

        RelatorioCorrecao {
            semente,
            total_registros: self.len(),
            hash_depois: self.content_hash(),
            depois: self.relatorio(plano),
            hash_antes,
            antes,
            correcoes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn banco_genero(feminino: usize, masculino: usize) -> BancoEleitores {
        let registros = (0..feminino)
            .map(|i| json!({"id": format!("f{}", i), "idade": 20 + i as i64 % 50, "genero": "feminino"}))
            .chain((0..masculino).map(|i| json!({"id": format!("m{}", i), "idade": 30 + i as i64 % 50, "genero": "masculino"})))
            .map(|v| match v {
                Value::Object(m) => m,
                _ => unreachable!(),
            })
            .collect();
        BancoEleitores::from_registros(registros)
    }

    fn alvo_genero() -> AlvoCategorico {
        AlvoCategorico {
            atributo: "genero".to_string(),
            tolerancia: None,
            alvos: [("feminino".to_string(), 52.0), ("masculino".to_string(), 48.0)]
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn test_contagens_alvo_largest_remainder() {
        assert_eq!(contagens_alvo(10, &[33.3, 33.3, 33.4]), vec![3, 3, 4]);
        assert_eq!(contagens_alvo(3, &[50.0, 50.0]), vec![2, 1]);
        assert_eq!(contagens_alvo(7, &[0.0, 0.0]), vec![0, 0]);
        assert_eq!(contagens_alvo(1000, &[12.5, 37.5, 50.0]).iter().sum::<usize>(), 1000);
    }

    #[test]
    fn test_corrigir_categorico_moves_minimum() {
        let mut banco = banco_genero(30, 70);
        let mut rng = StdRng::seed_from_u64(1);
        let correcao = banco.corrigir_categorico(&alvo_genero(), &[], 1.0, &mut rng);

        assert_eq!(correcao.alteracoes.len(), 22);
        assert!(correcao.pendencias.is_empty());
        let dist = banco.distribuicao("genero");
        assert_eq!(dist[0].categoria, "feminino");
        assert_eq!(dist[0].total, 52);
        assert_eq!(banco.len(), 100);
    }

    #[test]
    fn test_corrigir_categorico_within_tolerance_is_noop() {
        let mut banco = banco_genero(51, 49);
        let mut rng = StdRng::seed_from_u64(1);
        let correcao = banco.corrigir_categorico(&alvo_genero(), &[], 2.0, &mut rng);
        assert!(correcao.dentro_tolerancia);
        assert!(correcao.alteracoes.is_empty());
    }

    #[test]
    fn test_constraints_limit_moves() {
        let mut banco = banco_genero(0, 10);
        let restricoes = vec![Restricao {
            atributo: "genero".to_string(),
            valor: "feminino".to_string(),
            idade_minima: Some(37),
            idade_maxima: None,
        }];
        let mut rng = StdRng::seed_from_u64(9);
        let correcao = banco.corrigir_categorico(&alvo_genero(), &restricoes, 1.0, &mut rng);

        // target is 5 of 10; ages are 30..=39 and only 37..=39 may become "feminino"
        assert_eq!(correcao.alteracoes.len(), 3);
        assert_eq!(correcao.pendencias.len(), 1);
        assert_eq!(correcao.pendencias[0].faltando, 2);
        for alteracao in &correcao.alteracoes {
            let idade = valor_numerico(&banco.registros()[alteracao.indice], IDADE).unwrap();
            assert!(idade >= 37);
        }
    }

    #[test]
    fn test_corrigir_categorico_keeps_json_types() {
        let registros = [0, 0, 0, 1]
            .iter()
            .map(|&filhos| match json!({"idade": 30, "filhos": filhos, "ativo": filhos == 1}) {
                Value::Object(m) => m,
                _ => unreachable!(),
            })
            .collect();
        let mut banco = BancoEleitores::from_registros(registros);
        let mut rng = StdRng::seed_from_u64(3);

        let filhos = AlvoCategorico {
            atributo: "filhos".to_string(),
            tolerancia: None,
            alvos: [("0".to_string(), 50.0), ("1".to_string(), 50.0)].into_iter().collect(),
        };
        let correcao = banco.corrigir_categorico(&filhos, &[], 1.0, &mut rng);
        assert_eq!(correcao.alteracoes.len(), 1);
        assert_eq!(correcao.alteracoes[0].para, json!(1));
        assert!(banco.registros().iter().all(|r| r["filhos"].is_i64()));

        // Destination with no current member: the previous value's type is kept.
        let ativo = AlvoCategorico {
            atributo: "ativo".to_string(),
            tolerancia: None,
            alvos: [("true".to_string(), 100.0)].into_iter().collect(),
        };
        let mut banco = BancoEleitores::from_registros(
            banco
                .registros()
                .iter()
                .cloned()
                .map(|mut r| {
                    r.insert("ativo".to_string(), json!(false));
                    r
                })
                .collect(),
        );
        banco.corrigir_categorico(&ativo, &[], 1.0, &mut rng);
        assert!(banco.registros().iter().all(|r| r["ativo"] == json!(true)));
    }

    #[test]
    fn test_intervalo_permitido_applies_age_rules() {
        let registro = json!({"idade": 40, "ocupacao": "aposentado"});
        let Value::Object(registro) = registro else { unreachable!() };
        let restricoes = vec![Restricao {
            atributo: "ocupacao".to_string(),
            valor: "aposentado".to_string(),
            idade_minima: Some(50),
            idade_maxima: None,
        }];

        let jovens = Faixa { rotulo: None, min: 10, max: 24, percentual: 0.0 };
        let idosos = Faixa { rotulo: None, min: 45, max: 200, percentual: 0.0 };
        assert_eq!(intervalo_permitido(&registro, IDADE, &jovens, &restricoes), None);
        assert_eq!(intervalo_permitido(&registro, IDADE, &idosos, &restricoes), Some((50, 120)));
        assert_eq!(intervalo_permitido(&registro, IDADE, &jovens, &[]), Some((16, 24)));
    }
}
