//! In-circuit ElGamal ciphertexts and ballots

use ark_ec::AffineRepr;
use ark_r1cs_std::alloc::{AllocVar, AllocationMode};
use ark_r1cs_std::boolean::Boolean;
use ark_r1cs_std::eq::EqGadget;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::fields::FieldVar;
use ark_r1cs_std::groups::CurveVar;
use ark_r1cs_std::select::CondSelectGadget;
use ark_r1cs_std::ToBitsGadget;
use ark_relations::ns;
use ark_relations::r1cs::{ConstraintSystemRef, Namespace, SynthesisError};
use ark_std::borrow::Borrow;

use crate::circuit::gadgets::poseidon::chain_hash_gadget;
use crate::circuit::EmbeddedVar;
use crate::crypto::elgamal::{Ballot, Ciphertext};
use crate::{EmbeddedAffine, EmbeddedProjective, F};

/// One ElGamal ciphertext in-circuit.
#[derive(Clone)]
pub struct CiphertextVar {
    pub c1: EmbeddedVar,
    pub c2: EmbeddedVar,
}

impl AllocVar<Ciphertext, F> for CiphertextVar {
    fn new_variable<T: Borrow<Ciphertext>>(
        cs: impl Into<Namespace<F>>,
        f: impl FnOnce() -> Result<T, SynthesisError>,
        mode: AllocationMode,
    ) -> Result<Self, SynthesisError> {
        let ns = cs.into();
        let cs = ns.cs();
        let ct = f()?;
        let ct = ct.borrow();
        let c1 =
            EmbeddedVar::new_variable(ns!(cs, "c1"), || Ok(EmbeddedProjective::from(ct.c1)), mode)?;
        let c2 =
            EmbeddedVar::new_variable(ns!(cs, "c2"), || Ok(EmbeddedProjective::from(ct.c2)), mode)?;
        Ok(Self { c1, c2 })
    }
}

impl CiphertextVar {
    pub fn add(&self, other: &Self) -> Result<Self, SynthesisError> {
        Ok(Self {
            c1: self.c1.clone() + &other.c1,
            c2: self.c2.clone() + &other.c2,
        })
    }

    pub fn is_eq(&self, other: &Self) -> Result<Boolean<F>, SynthesisError> {
        Ok(self.c1.is_eq(&other.c1)?.and(&self.c2.is_eq(&other.c2)?)?)
    }
}

/// A fixed-width ballot in-circuit.
#[derive(Clone)]
pub struct BallotVar<const NF: usize> {
    pub ciphertexts: Vec<CiphertextVar>,
}

impl<const NF: usize> AllocVar<Ballot<NF>, F> for BallotVar<NF> {
    fn new_variable<T: Borrow<Ballot<NF>>>(
        cs: impl Into<Namespace<F>>,
        f: impl FnOnce() -> Result<T, SynthesisError>,
        mode: AllocationMode,
    ) -> Result<Self, SynthesisError> {
        let ns = cs.into();
        let cs = ns.cs();
        let ballot = f()?;
        let ballot = ballot.borrow().clone();
        let mut ciphertexts = Vec::with_capacity(NF);
        for ct in ballot.ciphertexts.iter() {
            ciphertexts.push(CiphertextVar::new_variable(ns!(cs, "ct"), || Ok(*ct), mode)?);
        }
        Ok(Self { ciphertexts })
    }
}

impl<const NF: usize> BallotVar<NF> {
    /// The all-neutral ballot as a constant.
    pub fn neutral(cs: ConstraintSystemRef<F>) -> Result<Self, SynthesisError> {
        Self::new_constant(cs, Ballot::<NF>::new())
    }

    pub fn add(&self, other: &Self) -> Result<Self, SynthesisError> {
        let ciphertexts = self
            .ciphertexts
            .iter()
            .zip(other.ciphertexts.iter())
            .map(|(a, b)| a.add(b))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { ciphertexts })
    }

    pub fn is_eq(&self, other: &Self) -> Result<Boolean<F>, SynthesisError> {
        let mut acc = Boolean::TRUE;
        for (a, b) in self.ciphertexts.iter().zip(other.ciphertexts.iter()) {
            acc = acc.and(&a.is_eq(b)?)?;
        }
        Ok(acc)
    }

    pub fn enforce_equal(&self, other: &Self) -> Result<(), SynthesisError> {
        for (a, b) in self.ciphertexts.iter().zip(other.ciphertexts.iter()) {
            a.c1.enforce_equal(&b.c1)?;
            a.c2.enforce_equal(&b.c2)?;
        }
        Ok(())
    }

    pub fn select(cond: &Boolean<F>, a: &Self, b: &Self) -> Result<Self, SynthesisError> {
        let ciphertexts = a
            .ciphertexts
            .iter()
            .zip(b.ciphertexts.iter())
            .map(|(a, b)| {
                Ok(CiphertextVar {
                    c1: EmbeddedVar::conditionally_select(cond, &a.c1, &b.c1)?,
                    c2: EmbeddedVar::conditionally_select(cond, &a.c2, &b.c2)?,
                })
            })
            .collect::<Result<Vec<_>, SynthesisError>>()?;
        Ok(Self { ciphertexts })
    }

    /// State-leaf serialization: RTE coordinates, `4·NF` elements.
    pub fn serialize_rte(&self) -> Vec<FpVar<F>> {
        let mut out = Vec::with_capacity(4 * NF);
        for ct in &self.ciphertexts {
            for p in [&ct.c1, &ct.c2] {
                out.push(p.x.clone());
                out.push(p.y.clone());
            }
        }
        out
    }

    /// Public-facing serialization: TE coordinates (negated x).
    pub fn serialize_te(&self) -> Result<Vec<FpVar<F>>, SynthesisError> {
        let mut out = Vec::with_capacity(4 * NF);
        for ct in &self.ciphertexts {
            for p in [&ct.c1, &ct.c2] {
                out.push(p.x.negate()?);
                out.push(p.y.clone());
            }
        }
        Ok(out)
    }

    /// An encryption of all zeroes whose randomness chain starts at `k0`:
    /// ciphertext `f` is `([k_f]G, [k_f]PK)` with `k_{f+1} = H_chain(k_f)`.
    pub fn encrypted_zero(
        cs: ConstraintSystemRef<F>,
        public_key: &EmbeddedVar,
        k0: &FpVar<F>,
    ) -> Result<Self, SynthesisError> {
        let generator = EmbeddedVar::constant(EmbeddedAffine::generator().into());
        let mut ciphertexts = Vec::with_capacity(NF);
        let mut k = k0.clone();
        for f in 0..NF {
            let k_bits = k.to_bits_le()?;
            let c1 = generator.scalar_mul_le(k_bits.iter())?;
            let c2 = public_key.scalar_mul_le(k_bits.iter())?;
            ciphertexts.push(CiphertextVar { c1, c2 });
            if f + 1 < NF {
                k = chain_hash_gadget(cs.clone(), &k)?;
            }
        }
        Ok(Self { ciphertexts })
    }

    /// Assert that every ciphertext decrypts to the claimed plaintext under
    /// the private key: `c2 - [sk]c1 == [m]G`.
    pub fn assert_decrypt(
        &self,
        sk_bits: &[Boolean<F>],
        expected: &[FpVar<F>],
    ) -> Result<(), SynthesisError> {
        let generator = EmbeddedVar::constant(EmbeddedAffine::generator().into());
        for (ct, message) in self.ciphertexts.iter().zip(expected.iter()) {
            let shared = ct.c1.scalar_mul_le(sk_bits.iter())?;
            let m_bits = message.to_bits_le()?;
            let lifted = generator.scalar_mul_le(m_bits.iter())?;
            (ct.c2.clone() - shared).enforce_equal(&lifted)?;
        }
        Ok(())
    }
}
