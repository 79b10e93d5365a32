//! Distribution measurements over the voter bank

use serde::Serialize;
use std::collections::BTreeMap;

use super::{valor_categoria, valor_numerico, BancoEleitores, Registro};
use crate::config::loader::{AlvoCategorico, AlvoFaixas, CorrectionPlan, Faixa};
use crate::database::models::ContagemCategoria;
use crate::pesquisa::resultados::percentual;

/// Category label for records outside every band.
pub const FORA_DAS_FAIXAS: &str = "(fora das faixas)";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LinhaRelatorio {
    pub categoria: String,
    pub total: usize,
    pub observado: f64,
    pub alvo: f64,
    /// Observed minus target, in percentage points.
    pub desvio: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RelatorioAtributo {
    pub atributo: String,
    pub tolerancia: f64,
    pub linhas: Vec<LinhaRelatorio>,
    pub desvio_maximo: f64,
    pub dentro_tolerancia: bool,
}

/// Index of the band containing the record's value, `None` when missing or outside all bands.
pub(crate) fn faixa_do_registro(registro: &Registro, atributo: &str, faixas: &[Faixa]) -> Option<usize> {
    let valor = valor_numerico(registro, atributo)?;
    faixas.iter().position(|f| f.contains(valor))
}

fn pct_exato(parte: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        parte as f64 * 100.0 / total as f64
    }
}

fn arredondar(valor: f64) -> f64 {
    (valor * 100.0).round() / 100.0
}

fn ordenar(contagens: BTreeMap<String, usize>, total: usize) -> Vec<ContagemCategoria> {
    let mut linhas: Vec<ContagemCategoria> = contagens
        .into_iter()
        .map(|(categoria, n)| ContagemCategoria {
            categoria,
            total: n as i64,
            percentual: percentual(n as i64, total as i64),
        })
        .collect();
    linhas.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.categoria.cmp(&b.categoria)));
    linhas
}

fn montar_relatorio(
    atributo: &str,
    tolerancia: f64,
    total: usize,
    contagens: &BTreeMap<String, usize>,
    alvos: &[(String, f64)],
) -> RelatorioAtributo {
    let mut linhas: Vec<LinhaRelatorio> = alvos
        .iter()
        .map(|(categoria, alvo)| {
            let n = contagens.get(categoria).copied().unwrap_or(0);
            (categoria.clone(), n, *alvo)
        })
        .chain(
            contagens
                .iter()
                .filter(|(categoria, _)| !alvos.iter().any(|(c, _)| c == *categoria))
                .map(|(categoria, n)| (categoria.clone(), *n, 0.0)),
        )
        .map(|(categoria, n, alvo)| {
            let observado = pct_exato(n, total);
            LinhaRelatorio {
                categoria,
                total: n,
                observado,
                alvo,
                desvio: observado - alvo,
            }
        })
        .collect();

    let desvio_maximo = linhas.iter().map(|l| l.desvio.abs()).fold(0.0, f64::max);
    for linha in &mut linhas {
        linha.observado = arredondar(linha.observado);
        linha.desvio = arredondar(linha.desvio);
    }

    RelatorioAtributo {
        atributo: atributo.to_string(),
        tolerancia,
        linhas,
        desvio_maximo: arredondar(desvio_maximo),
        dentro_tolerancia: total == 0 || desvio_maximo <= tolerancia + f64::EPSILON,
    }
}

impl BancoEleitores {
    /// Count and share of every observed value of `atributo`, largest first.
    pub fn distribuicao(&self, atributo: &str) -> Vec<ContagemCategoria> {
        ordenar(self.contagens(atributo), self.len())
    }

    /// Count and share per band of a numeric attribute.
    pub fn distribuicao_faixas(&self, atributo: &str, faixas: &[Faixa]) -> Vec<ContagemCategoria> {
        ordenar(self.contagens_faixas(atributo, faixas), self.len())
    }

    pub(crate) fn contagens(&self, atributo: &str) -> BTreeMap<String, usize> {
        let mut contagens = BTreeMap::new();
        for registro in self.registros() {
            *contagens.entry(valor_categoria(registro, atributo)).or_insert(0) += 1;
        }
        contagens
    }

    fn contagens_faixas(&self, atributo: &str, faixas: &[Faixa]) -> BTreeMap<String, usize> {
        let mut contagens = BTreeMap::new();
        for registro in self.registros() {
            let rotulo = match faixa_do_registro(registro, atributo, faixas) {
                Some(i) => faixas[i].rotulo(),
                None => FORA_DAS_FAIXAS.to_string(),
            };
            *contagens.entry(rotulo).or_insert(0) += 1;
        }
        contagens
    }

    pub fn relatorio_categorico(&self, alvo: &AlvoCategorico, tolerancia: f64) -> RelatorioAtributo {
        let alvos: Vec<(String, f64)> = alvo.alvos.iter().map(|(c, p)| (c.clone(), *p)).collect();
        montar_relatorio(&alvo.atributo, tolerancia, self.len(), &self.contagens(&alvo.atributo), &alvos)
    }

    pub fn relatorio_faixas(&self, alvo: &AlvoFaixas, tolerancia: f64) -> RelatorioAtributo {
        let alvos: Vec<(String, f64)> = alvo.faixas.iter().map(|f| (f.rotulo(), f.percentual)).collect();
        let contagens = self.contagens_faixas(&alvo.atributo, &alvo.faixas);
        montar_relatorio(&alvo.atributo, tolerancia, self.len(), &contagens, &alvos)
    }

    /// Observed versus target for every attribute in the plan, bands first.
    pub fn relatorio(&self, plano: &CorrectionPlan) -> Vec<RelatorioAtributo> {
        plano
            .faixas
            .iter()
            .map(|alvo| self.relatorio_faixas(alvo, plano.tolerancia_para(alvo.tolerancia)))
            .chain(
                plano
                    .categoricos
                    .iter()
                    .map(|alvo| self.relatorio_categorico(alvo, plano.tolerancia_para(alvo.tolerancia))),
            )
            .collect()
    }
}
