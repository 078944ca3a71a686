use markup5ever::{expanded_name, local_name, namespace_url, ns};

use crate::document::AcquiredNodes;
use crate::element::{set_attribute, ElementData, ElementTrait};
use crate::node::{Node, NodeBorrow};
use crate::parsers::ParseValue;
use crate::rect::IRect;
use crate::surface_utils::shared_surface::{Operator, SharedImageSurface};
use crate::xml::Attributes;

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::{
    FilterEffect, FilterError, FilterResolveError, Input, InputRequirements, Primitive,
    PrimitiveParams, ResolvedPrimitive,
};

/// The `feMerge` filter primitive.
#[derive(Default)]
pub struct FeMerge {
    base: Primitive,
}

/// The `<feMergeNode>` element.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeMergeNode {
    in1: Input,
}

/// Resolved `feMerge` primitive for rendering.
pub struct Merge {
    pub merge_nodes: Vec<FeMergeNode>,
}

impl ElementTrait for FeMerge {
    fn set_attributes(&mut self, attrs: &Attributes) {
        self.base.parse_no_inputs(attrs);
    }
}

impl ElementTrait for FeMergeNode {
    fn set_attributes(&mut self, attrs: &Attributes) {
        for (attr, value) in attrs.iter() {
            if let expanded_name!("", "in") = attr.expanded() {
                set_attribute(&mut self.in1, attr.parse(value));
            }
        }
    }
}

impl Merge {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        // Compute the filter bounds, taking each feMergeNode's input into account.
        let mut bounds_builder = bounds_builder;
        let mut inputs = Vec::with_capacity(self.merge_nodes.len());
        for merge_node in &self.merge_nodes {
            let input = ctx.get_input(&merge_node.in1)?;
            bounds_builder = bounds_builder.add_input(&input);
            inputs.push(input);
        }

        let bounds: IRect = bounds_builder.compute_irect(ctx);

        // Now merge them all, each one over the previous ones.
        let source = ctx.source_graphic();
        let mut output_surface = SharedImageSurface::empty(source.width(), source.height())?;
        for input in &inputs {
            output_surface = input
                .surface()
                .compose(&output_surface, bounds, Operator::Over)?;
        }

        Ok(FilterOutput {
            surface: output_surface,
            bounds,
        })
    }

    pub fn get_input_requirements(&self) -> InputRequirements {
        self.merge_nodes
            .iter()
            .map(|mn| mn.in1.get_requirements())
            .fold(InputRequirements::default(), |a, b| a.fold(b))
    }
}

impl FilterEffect for FeMerge {
    fn resolve(
        &self,
        _acquired_nodes: &mut AcquiredNodes<'_>,
        node: &Node,
    ) -> Result<Vec<ResolvedPrimitive>, FilterResolveError> {
        Ok(vec![ResolvedPrimitive {
            primitive: self.base.clone(),
            params: PrimitiveParams::Merge(Merge {
                merge_nodes: resolve_merge_nodes(node),
            }),
        }])
    }
}

/// Takes a feMerge and walks its children to produce a list of feMergeNode arguments.
fn resolve_merge_nodes(node: &Node) -> Vec<FeMergeNode> {
    node.children()
        .filter(|c| c.is_element())
        .filter_map(|c| match *c.borrow_element_data() {
            ElementData::FeMergeNode(ref merge_node) => Some((**merge_node).clone()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::tests::{apply, filter_document_with_children, square, PrimitiveDecl};
    use crate::surface_utils::Pixel;

    #[test]
    fn extracts_parameters() {
        let prims: Vec<PrimitiveDecl<'_>> = vec![(
            "feMerge",
            &[("id", "merge")],
            vec![
                ("feMergeNode", &[("in", "SourceGraphic")]),
                ("feFlood", &[]),
                ("feMergeNode", &[("in", "SourceAlpha")]),
            ],
        )];

        let document = filter_document_with_children(&prims);
        let merge = document.lookup_node("merge").unwrap();

        assert_eq!(
            resolve_merge_nodes(&merge),
            vec![
                FeMergeNode {
                    in1: Input::SourceGraphic
                },
                FeMergeNode {
                    in1: Input::SourceAlpha
                },
            ]
        );
    }

    #[test]
    fn later_nodes_go_on_top() {
        let red = Pixel::new(255, 0, 0, 255);
        let source = square(IRect::new(0, 0, 5, 10), red);

        let prims: Vec<PrimitiveDecl<'_>> = vec![
            ("feFlood", &[("flood-color", "blue"), ("result", "blue")], vec![]),
            (
                "feMerge",
                &[],
                vec![("feMergeNode", &[("in", "blue")]), ("feMergeNode", &[("in", "SourceGraphic")])],
            ),
        ];

        let output = apply(&filter_document_with_children(&prims), &source);

        assert_eq!(output.get_pixel(2, 2), red);
        assert_eq!(output.get_pixel(7, 2), Pixel::new(0, 0, 255, 255));
    }

    #[test]
    fn no_merge_nodes_is_transparent() {
        let source = square(IRect::from_size(10, 10), Pixel::new(255, 0, 0, 255));
        let prims: Vec<PrimitiveDecl<'_>> = vec![("feMerge", &[], vec![])];

        let output = apply(&filter_document_with_children(&prims), &source);

        assert_eq!(output.get_pixel(5, 5), Pixel::default());
    }
}
